use std::time::Duration as StdDuration;

use color_eyre::{Result, eyre};
use time::{Duration, OffsetDateTime};
use tokio::time as tokio_time;

use sift_domain::source::SourceType;
use sift_service::{IngestOp, IngestSourceInput, SiftService};
use sift_storage::{jobs, models::IngestionJob};

const MAX_JOB_ERROR_CHARS: usize = 1_024;

pub async fn run_worker(service: SiftService) -> Result<()> {
	let poll_interval = StdDuration::from_millis(service.cfg.ingestion.poll_interval_ms);

	loop {
		if let Err(err) = process_batch_once(&service).await {
			tracing::error!(error = %err, "Ingestion batch failed.");
		}

		tokio_time::sleep(poll_interval).await;
	}
}

/// Claims one due batch and works through it sequentially. A failed job is
/// rescheduled (or parked as terminal) without disturbing the rest of the
/// batch.
pub async fn process_batch_once(service: &SiftService) -> Result<()> {
	let ingestion = &service.cfg.ingestion;
	let now = OffsetDateTime::now_utc();
	let batch = jobs::claim_due_jobs(
		&service.db,
		now,
		i64::from(ingestion.batch_limit),
		ingestion.lease_seconds,
	)
	.await?;

	for job in batch {
		// The claim already counted this attempt. A job past the cap at claim
		// time only got here by crashing the worker on every earlier lease;
		// park it instead of running it again.
		if job.attempts > ingestion.max_attempts {
			let now = OffsetDateTime::now_utc();

			tracing::error!(job_id = %job.job_id, attempts = job.attempts, "Ingestion job exhausted its attempts without recording a failure; parking it.");
			jobs::mark_job_failed(
				&service.db,
				job.job_id,
				job.attempts,
				ingestion.max_attempts,
				"Worker crashed or timed out on every attempt.",
				now,
				now,
			)
			.await?;

			continue;
		}

		match run_job(service, &job).await {
			Ok(source_id) => {
				tracing::info!(job_id = %job.job_id, source_id = %source_id, op = job.op.as_str(), "Ingestion job done.");
				jobs::mark_job_done(&service.db, job.job_id, OffsetDateTime::now_utc()).await?;
			},
			Err(err) => {
				let attempts = job.attempts;
				let delay =
					backoff_delay(ingestion.base_backoff_ms, attempts, ingestion.cap_attempts);
				let now = OffsetDateTime::now_utc();
				let error_text = sanitize_job_error(&err.to_string());
				let terminal = attempts >= ingestion.max_attempts;

				tracing::error!(
					job_id = %job.job_id,
					attempts,
					terminal,
					error = %error_text,
					"Ingestion job failed.",
				);
				jobs::mark_job_failed(
					&service.db,
					job.job_id,
					attempts,
					ingestion.max_attempts,
					&error_text,
					now + delay,
					now,
				)
				.await?;
			},
		}
	}

	Ok(())
}

async fn run_job(service: &SiftService, job: &IngestionJob) -> Result<uuid::Uuid> {
	let op = IngestOp::parse(&job.op)
		.ok_or_else(|| eyre::eyre!("Unknown ingestion op {:?}.", job.op))?;

	match op {
		IngestOp::Upsert => {
			let input: IngestSourceInput = serde_json::from_value(job.payload.clone())
				.map_err(|err| eyre::eyre!("Malformed job payload: {err}."))?;
			let source_id = service
				.upsert_source_with_chunks(&input, op)
				.await
				.map_err(|err| eyre::eyre!(err.to_string()))?;

			Ok(source_id)
		},
		IngestOp::Reindex => {
			let source_type = SourceType::parse(&job.source_type)
				.ok_or_else(|| eyre::eyre!("Unknown source type {:?}.", job.source_type))?;
			let source_id = service
				.reindex_source(source_type, &job.source_ref)
				.await
				.map_err(|err| eyre::eyre!(err.to_string()))?;

			Ok(source_id)
		},
	}
}

/// Linear backoff capped at `cap_attempts` multiples of the base delay, so
/// retries slow down without the wait growing unbounded.
pub fn backoff_delay(base_ms: i64, attempts: i32, cap_attempts: i32) -> Duration {
	let factor = i64::from(attempts.clamp(1, cap_attempts.max(1)));

	Duration::milliseconds(base_ms.saturating_mul(factor))
}

/// Provider errors can echo request headers; redact anything that looks like
/// a credential before it lands in `last_error`.
fn sanitize_job_error(text: &str) -> String {
	let mut parts = Vec::new();
	let mut redact_next = false;

	for raw in text.split_whitespace() {
		let mut word = raw.to_string();

		if redact_next {
			word = "[REDACTED]".to_string();
			redact_next = false;
		}
		if raw.eq_ignore_ascii_case("bearer") {
			redact_next = true;
		}

		let lowered = raw.to_ascii_lowercase();

		for key in ["api_key", "apikey", "password", "secret", "token"] {
			if lowered.contains(key) && (lowered.contains('=') || lowered.contains(':')) {
				let sep = if raw.contains('=') { '=' } else { ':' };
				let prefix = match raw.split(sep).next() {
					Some(prefix) => prefix,
					None => raw,
				};

				word = format!("{prefix}{sep}[REDACTED]");

				break;
			}
		}

		parts.push(word);
	}

	let mut out = parts.join(" ");

	if out.chars().count() > MAX_JOB_ERROR_CHARS {
		out = out.chars().take(MAX_JOB_ERROR_CHARS).collect();
		out.push_str("...");
	}

	out
}
