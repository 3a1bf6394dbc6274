use serde_json::json;
use time::{Duration, OffsetDateTime};

use sift_config::Postgres;
use sift_storage::{db::Db, jobs};

use super::suite;

async fn job_db(test_db: &sift_testkit::TestDatabase) -> Db {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to apply schema.");

	db
}

#[tokio::test]
async fn a_claimed_job_is_invisible_to_other_pollers_until_the_lease_expires() {
	let Some(test_db) = suite::test_db().await else {
		eprintln!("Skipping; requires SIFT_PG_DSN.");

		return;
	};
	let db = job_db(&test_db).await;
	let now = OffsetDateTime::now_utc();

	jobs::enqueue_job(&db.pool, "ticket", "T-1", "upsert", &json!({}), 0)
		.await
		.expect("Enqueue failed.");

	let claimed = jobs::claim_due_jobs(&db, now, 10, 300).await.expect("Claim failed.");

	assert_eq!(claimed.len(), 1);
	assert_eq!(claimed[0].status, "PROCESSING");

	let reclaimed = jobs::claim_due_jobs(&db, now, 10, 300).await.expect("Claim failed.");

	assert!(reclaimed.is_empty());

	// Past the lease the job surfaces again.
	let later = now + Duration::seconds(301);
	let reclaimed = jobs::claim_due_jobs(&db, later, 10, 300).await.expect("Claim failed.");

	assert_eq!(reclaimed.len(), 1);
}

#[tokio::test]
async fn a_failed_job_retries_until_the_attempt_cap_then_parks() {
	let Some(test_db) = suite::test_db().await else {
		eprintln!("Skipping; requires SIFT_PG_DSN.");

		return;
	};
	let db = job_db(&test_db).await;
	let now = OffsetDateTime::now_utc();
	let job_id = jobs::enqueue_job(&db.pool, "ticket", "T-2", "upsert", &json!({}), 0)
		.await
		.expect("Enqueue failed.");
	let max_attempts = 2;

	let claimed = jobs::claim_due_jobs(&db, now, 10, 300).await.expect("Claim failed.");

	assert_eq!(claimed.len(), 1);
	// The claim itself counts the attempt.
	assert_eq!(claimed[0].attempts, 1);

	jobs::mark_job_failed(&db, job_id, 1, max_attempts, "boom", now + Duration::seconds(5), now)
		.await
		.expect("Mark failed errored.");

	// Backed off: not due yet, then due again.
	assert!(jobs::claim_due_jobs(&db, now, 10, 300).await.expect("Claim failed.").is_empty());

	let retry_at = now + Duration::seconds(6);
	let claimed = jobs::claim_due_jobs(&db, retry_at, 10, 300).await.expect("Claim failed.");

	assert_eq!(claimed.len(), 1);
	assert_eq!(claimed[0].attempts, 2);

	jobs::mark_job_failed(
		&db,
		job_id,
		2,
		max_attempts,
		"boom again",
		retry_at + Duration::seconds(5),
		retry_at,
	)
	.await
	.expect("Mark failed errored.");

	// Terminal: never claimable again, and no longer pending.
	let much_later = retry_at + Duration::seconds(3_600);

	assert!(jobs::claim_due_jobs(&db, much_later, 10, 300).await.expect("Claim failed.").is_empty());
	assert_eq!(jobs::pending_job_count(&db).await.expect("Count failed."), 0);
}

#[tokio::test]
async fn done_jobs_leave_the_pending_count() {
	let Some(test_db) = suite::test_db().await else {
		eprintln!("Skipping; requires SIFT_PG_DSN.");

		return;
	};
	let db = job_db(&test_db).await;
	let now = OffsetDateTime::now_utc();
	let job_id = jobs::enqueue_job(&db.pool, "ticket", "T-3", "upsert", &json!({}), 0)
		.await
		.expect("Enqueue failed.");

	assert_eq!(jobs::pending_job_count(&db).await.expect("Count failed."), 1);

	let claimed = jobs::claim_due_jobs(&db, now, 10, 300).await.expect("Claim failed.");

	assert_eq!(claimed.len(), 1);

	jobs::mark_job_done(&db, job_id, now).await.expect("Mark done failed.");

	assert_eq!(jobs::pending_job_count(&db).await.expect("Count failed."), 0);
}
