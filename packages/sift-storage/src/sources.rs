use std::collections::{HashMap, HashSet};

use serde_json::Value;
use sqlx::PgExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	models::{ChunkRecord, SourceRecord},
};

pub struct UpsertSource<'a> {
	pub source_id: Uuid,
	pub source_type: &'a str,
	pub provider_ref: &'a str,
	pub source_uri: Option<&'a str>,
	pub title: &'a str,
	pub sensitivity: &'a str,
	pub customer_id: Option<i64>,
	pub ticket_id: Option<i64>,
	pub thread_id: Option<&'a str>,
	pub owner_user_id: Option<i64>,
	pub department: Option<&'a str>,
	pub metadata: &'a Value,
	pub content_hash: &'a str,
	pub source_created_at: Option<OffsetDateTime>,
	pub source_updated_at: Option<OffsetDateTime>,
}

/// Inserts or updates one source keyed by `(source_type, provider_ref)`.
/// Returns the stored row; its `source_id` is the existing id on conflict,
/// not necessarily the one passed in.
pub async fn upsert_source<'e, E>(executor: E, input: &UpsertSource<'_>) -> Result<SourceRecord>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, SourceRecord>(
		"\
INSERT INTO rag_sources (
\tsource_id, source_type, provider_ref, source_uri, title, sensitivity,
\tcustomer_id, ticket_id, thread_id, owner_user_id, department, metadata,
\tcontent_hash, source_created_at, source_updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
ON CONFLICT (source_type, provider_ref) DO UPDATE SET
\tsource_uri = EXCLUDED.source_uri,
\ttitle = EXCLUDED.title,
\tsensitivity = EXCLUDED.sensitivity,
\tcustomer_id = EXCLUDED.customer_id,
\tticket_id = EXCLUDED.ticket_id,
\tthread_id = EXCLUDED.thread_id,
\towner_user_id = EXCLUDED.owner_user_id,
\tdepartment = EXCLUDED.department,
\tmetadata = EXCLUDED.metadata,
\tcontent_hash = EXCLUDED.content_hash,
\tsource_created_at = EXCLUDED.source_created_at,
\tsource_updated_at = EXCLUDED.source_updated_at,
\tupdated_at = now()
RETURNING
\tsource_id, source_type, provider_ref, source_uri, title, sensitivity,
\tcustomer_id, ticket_id, thread_id, owner_user_id, department, metadata,
\tcontent_hash, source_created_at, source_updated_at, created_at, updated_at",
	)
	.bind(input.source_id)
	.bind(input.source_type)
	.bind(input.provider_ref)
	.bind(input.source_uri)
	.bind(input.title)
	.bind(input.sensitivity)
	.bind(input.customer_id)
	.bind(input.ticket_id)
	.bind(input.thread_id)
	.bind(input.owner_user_id)
	.bind(input.department)
	.bind(input.metadata)
	.bind(input.content_hash)
	.bind(input.source_created_at)
	.bind(input.source_updated_at)
	.fetch_one(executor)
	.await?;

	Ok(row)
}

pub async fn find_source<'e, E>(
	executor: E,
	source_type: &str,
	provider_ref: &str,
) -> Result<Option<SourceRecord>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, SourceRecord>(
		"\
SELECT
\tsource_id, source_type, provider_ref, source_uri, title, sensitivity,
\tcustomer_id, ticket_id, thread_id, owner_user_id, department, metadata,
\tcontent_hash, source_created_at, source_updated_at, created_at, updated_at
FROM rag_sources
WHERE source_type = $1 AND provider_ref = $2",
	)
	.bind(source_type)
	.bind(provider_ref)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

/// Replaces a source's chunk rows wholesale. Old rows go first so stale
/// trailing chunks from a longer previous revision cannot survive.
pub async fn replace_chunks(
	tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
	source_id: Uuid,
	chunks: &[ChunkRecord],
) -> Result<()> {
	sqlx::query("DELETE FROM rag_chunks WHERE source_id = $1")
		.bind(source_id)
		.execute(&mut **tx)
		.await?;

	for chunk in chunks {
		sqlx::query(
			"\
INSERT INTO rag_chunks (chunk_id, source_id, chunk_index, chunk_text, chunk_hash)
VALUES ($1, $2, $3, $4, $5)",
		)
		.bind(chunk.chunk_id)
		.bind(source_id)
		.bind(chunk.chunk_index)
		.bind(&chunk.chunk_text)
		.bind(&chunk.chunk_hash)
		.execute(&mut **tx)
		.await?;
	}

	Ok(())
}

/// Deletes a source; its chunks go with it via cascade. The embedding cache
/// is hash-keyed and global, so its rows stay. Returns the deleted source id
/// so the caller can drop the vector points.
pub async fn delete_source(
	db: &Db,
	source_type: &str,
	provider_ref: &str,
) -> Result<Option<Uuid>> {
	let Some(source) = find_source(&db.pool, source_type, provider_ref).await? else {
		return Ok(None);
	};

	sqlx::query("DELETE FROM rag_sources WHERE source_id = $1")
		.bind(source.source_id)
		.execute(&db.pool)
		.await?;

	Ok(Some(source.source_id))
}

/// Loads cached vectors for the given chunk hashes at one embedding version.
/// Hashes that miss are simply absent from the map.
pub async fn cached_embeddings(
	db: &Db,
	chunk_hashes: &[String],
	embedding_version: &str,
) -> Result<HashMap<String, Vec<f32>>> {
	if chunk_hashes.is_empty() {
		return Ok(HashMap::new());
	}

	let unique = chunk_hashes.iter().cloned().collect::<HashSet<_>>().into_iter().collect::<Vec<_>>();
	let rows: Vec<(String, Vec<f32>)> = sqlx::query_as(
		"\
SELECT chunk_hash, vec
FROM rag_chunk_embeddings
WHERE chunk_hash = ANY($1) AND embedding_version = $2",
	)
	.bind(&unique)
	.bind(embedding_version)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows.into_iter().collect())
}

pub async fn store_embedding<'e, E>(
	executor: E,
	chunk_hash: &str,
	embedding_version: &str,
	vec: &[f32],
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO rag_chunk_embeddings (chunk_hash, embedding_version, embedding_dim, vec)
VALUES ($1, $2, $3, $4)
ON CONFLICT (chunk_hash, embedding_version) DO NOTHING",
	)
	.bind(chunk_hash)
	.bind(embedding_version)
	.bind(vec.len() as i32)
	.bind(vec)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn chunks_for_source(db: &Db, source_id: Uuid) -> Result<Vec<ChunkRecord>> {
	let rows = sqlx::query_as::<_, ChunkRecord>(
		"\
SELECT chunk_id, source_id, chunk_index, chunk_text, chunk_hash, created_at
FROM rag_chunks
WHERE source_id = $1
ORDER BY chunk_index",
	)
	.bind(source_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn sources_for_ticket(db: &Db, ticket_id: i64) -> Result<Vec<SourceRecord>> {
	let rows = sqlx::query_as::<_, SourceRecord>(
		"\
SELECT
\tsource_id, source_type, provider_ref, source_uri, title, sensitivity,
\tcustomer_id, ticket_id, thread_id, owner_user_id, department, metadata,
\tcontent_hash, source_created_at, source_updated_at, created_at, updated_at
FROM rag_sources
WHERE ticket_id = $1
ORDER BY source_created_at NULLS LAST",
	)
	.bind(ticket_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// The customer a ticket's ingested sources are attributed to, if any.
pub async fn ticket_customer(db: &Db, ticket_id: i64) -> Result<Option<i64>> {
	let row: Option<(Option<i64>,)> = sqlx::query_as(
		"\
SELECT customer_id
FROM rag_sources
WHERE ticket_id = $1 AND customer_id IS NOT NULL
LIMIT 1",
	)
	.bind(ticket_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row.and_then(|(customer_id,)| customer_id))
}

/// The (source_type, provider_ref) pairs of a given set of types, for admin
/// backfills. An empty filter selects every source.
pub async fn source_refs_by_types(
	db: &Db,
	source_types: &[String],
) -> Result<Vec<(String, String)>> {
	let rows: Vec<(String, String)> = if source_types.is_empty() {
		sqlx::query_as("SELECT source_type, provider_ref FROM rag_sources ORDER BY updated_at")
			.fetch_all(&db.pool)
			.await?
	} else {
		sqlx::query_as(
			"SELECT source_type, provider_ref FROM rag_sources WHERE source_type = ANY($1) ORDER BY updated_at",
		)
		.bind(source_types)
		.fetch_all(&db.pool)
		.await?
	};

	Ok(rows)
}
