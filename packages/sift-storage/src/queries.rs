use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	models::{AppUser, CandidateChunk},
};

const CANDIDATE_COLUMNS: &str = "\
\tc.chunk_id,
\tc.source_id,
\tc.chunk_index,
\tc.chunk_text,
\ts.source_type,
\ts.provider_ref,
\ts.source_uri,
\ts.title,
\ts.sensitivity,
\ts.customer_id,
\ts.ticket_id,
\ts.department,
\ts.metadata,
\ts.source_created_at,
\ts.source_updated_at";

/// Full-text candidates ranked by `ts_rank` over the generated tsvector
/// column. `customer_id` narrows the scan when the query context pins one
/// customer; access control still runs on every returned row.
pub async fn lexical_search(
	db: &Db,
	query_text: &str,
	customer_id: Option<i64>,
	limit: i64,
) -> Result<Vec<CandidateChunk>> {
	let sql = format!(
		"\
SELECT
{CANDIDATE_COLUMNS},
\tts_rank(c.chunk_tsv, plainto_tsquery('english', $1)) AS fts_rank
FROM rag_chunks c
JOIN rag_sources s ON s.source_id = c.source_id
WHERE c.chunk_tsv @@ plainto_tsquery('english', $1)
\tAND ($2::BIGINT IS NULL OR s.customer_id = $2 OR s.customer_id IS NULL)
ORDER BY fts_rank DESC
LIMIT $3"
	);
	let rows = sqlx::query_as::<_, CandidateChunk>(&sql)
		.bind(query_text)
		.bind(customer_id)
		.bind(limit)
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

/// Hydrates vector-search hits back into full candidate rows. `fts_rank`
/// stays `NULL` for rows that only the vector side produced.
pub async fn candidates_by_chunk_ids(db: &Db, chunk_ids: &[Uuid]) -> Result<Vec<CandidateChunk>> {
	if chunk_ids.is_empty() {
		return Ok(Vec::new());
	}

	let sql = format!(
		"\
SELECT
{CANDIDATE_COLUMNS},
\tNULL::REAL AS fts_rank
FROM rag_chunks c
JOIN rag_sources s ON s.source_id = c.source_id
WHERE c.chunk_id = ANY($1)"
	);
	let rows = sqlx::query_as::<_, CandidateChunk>(&sql)
		.bind(chunk_ids)
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

pub async fn load_user(db: &Db, user_id: i64) -> Result<Option<AppUser>> {
	let row = sqlx::query_as::<_, AppUser>(
		"SELECT user_id, role, is_external FROM app_users WHERE user_id = $1",
	)
	.bind(user_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

pub async fn customer_grants(db: &Db, user_id: i64) -> Result<Vec<i64>> {
	let rows: Vec<(i64,)> =
		sqlx::query_as("SELECT customer_id FROM user_customer_grants WHERE user_id = $1")
			.bind(user_id)
			.fetch_all(&db.pool)
			.await?;

	Ok(rows.into_iter().map(|(customer_id,)| customer_id).collect())
}

pub async fn department_grants(db: &Db, user_id: i64) -> Result<Vec<String>> {
	let rows: Vec<(String,)> =
		sqlx::query_as("SELECT department FROM user_department_grants WHERE user_id = $1")
			.bind(user_id)
			.fetch_all(&db.pool)
			.await?;

	Ok(rows.into_iter().map(|(department,)| department).collect())
}
