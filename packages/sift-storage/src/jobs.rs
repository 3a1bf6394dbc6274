use serde_json::Value;
use sqlx::PgExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Result, db::Db, models::IngestionJob};

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_PROCESSING: &str = "PROCESSING";
pub const STATUS_DONE: &str = "DONE";
pub const STATUS_FAILED: &str = "FAILED";

pub async fn enqueue_job<'e, E>(
	executor: E,
	source_type: &str,
	source_ref: &str,
	op: &str,
	payload: &Value,
	priority: i32,
) -> Result<Uuid>
where
	E: PgExecutor<'e>,
{
	let job_id = Uuid::new_v4();

	sqlx::query(
		"\
INSERT INTO ingestion_jobs (job_id, source_type, source_ref, op, payload, priority, status)
VALUES ($1, $2, $3, $4, $5, $6, 'PENDING')",
	)
	.bind(job_id)
	.bind(source_type)
	.bind(source_ref)
	.bind(op)
	.bind(payload)
	.bind(priority)
	.execute(executor)
	.await?;

	Ok(job_id)
}

/// Claims up to `limit` due jobs under `FOR UPDATE SKIP LOCKED` and leases
/// them by pushing `next_run_at` past now. The claim itself counts the
/// attempt, so a worker that dies mid-batch cannot retry a poison job
/// forever: its jobs surface again once the lease expires, each re-lease
/// consuming one more attempt.
pub async fn claim_due_jobs(
	db: &Db,
	now: OffsetDateTime,
	limit: i64,
	lease_seconds: i64,
) -> Result<Vec<IngestionJob>> {
	let mut tx = db.pool.begin().await?;
	let mut jobs = sqlx::query_as::<_, IngestionJob>(
		"\
SELECT
\tjob_id,
\tsource_type,
\tsource_ref,
\top,
\tpayload,
\tstatus,
\tpriority,
\tattempts,
\tlast_error,
\tnext_run_at,
\tcreated_at,
\tupdated_at
FROM ingestion_jobs
WHERE status IN ('PENDING', 'PROCESSING') AND next_run_at <= $1
ORDER BY priority DESC, next_run_at ASC
LIMIT $2
FOR UPDATE SKIP LOCKED",
	)
	.bind(now)
	.bind(limit)
	.fetch_all(&mut *tx)
	.await?;

	if !jobs.is_empty() {
		let lease_until = now + time::Duration::seconds(lease_seconds);
		let job_ids = jobs.iter().map(|job| job.job_id).collect::<Vec<_>>();

		sqlx::query(
			"\
UPDATE ingestion_jobs
SET status = 'PROCESSING', attempts = attempts + 1, next_run_at = $1, updated_at = $2
WHERE job_id = ANY($3)",
		)
		.bind(lease_until)
		.bind(now)
		.bind(&job_ids)
		.execute(&mut *tx)
		.await?;

		for job in &mut jobs {
			job.status = STATUS_PROCESSING.to_string();
			job.attempts += 1;
			job.next_run_at = lease_until;
			job.updated_at = now;
		}
	}

	tx.commit().await?;

	Ok(jobs)
}

pub async fn mark_job_done(db: &Db, job_id: Uuid, now: OffsetDateTime) -> Result<()> {
	sqlx::query("UPDATE ingestion_jobs SET status = 'DONE', updated_at = $1 WHERE job_id = $2")
		.bind(now)
		.bind(job_id)
		.execute(&db.pool)
		.await?;

	Ok(())
}

/// Records the outcome of a failed attempt (counted at claim time). Below
/// `max_attempts` the job goes back to `PENDING` with `next_run_at` pushed
/// out by the caller's backoff; at or past the cap it parks as terminal
/// `FAILED` and the poll loop never picks it up again.
pub async fn mark_job_failed(
	db: &Db,
	job_id: Uuid,
	attempts: i32,
	max_attempts: i32,
	error_text: &str,
	next_run_at: OffsetDateTime,
	now: OffsetDateTime,
) -> Result<()> {
	let status = if attempts >= max_attempts { STATUS_FAILED } else { STATUS_PENDING };

	sqlx::query(
		"\
UPDATE ingestion_jobs
SET status = $1,
\tattempts = $2,
\tlast_error = $3,
\tnext_run_at = $4,
\tupdated_at = $5
WHERE job_id = $6",
	)
	.bind(status)
	.bind(attempts)
	.bind(error_text)
	.bind(next_run_at)
	.bind(now)
	.bind(job_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn pending_job_count(db: &Db) -> Result<i64> {
	let count: (i64,) = sqlx::query_as(
		"SELECT COUNT(*) FROM ingestion_jobs WHERE status IN ('PENDING', 'PROCESSING')",
	)
	.fetch_one(&db.pool)
	.await?;

	Ok(count.0)
}
