use std::collections::HashMap;

use qdrant_client::{
	Payload,
	qdrant::{Condition, DeletePointsBuilder, Filter, PointStruct, UpsertPointsBuilder, Vector},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use sift_domain::{
	normalize,
	source::{Sensitivity, SourceType},
};
use sift_storage::{
	jobs,
	models::{ChunkRecord, SourceRecord},
	qdrant::DENSE_VECTOR_NAME,
	sources::{self, UpsertSource},
};

use crate::{Error, Result, SiftService, embedding_version};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOp {
	Upsert,
	Reindex,
}
impl IngestOp {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Upsert => "upsert",
			Self::Reindex => "reindex",
		}
	}

	pub fn parse(label: &str) -> Option<Self> {
		match label {
			"upsert" => Some(Self::Upsert),
			"reindex" => Some(Self::Reindex),
			_ => None,
		}
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IngestSourceInput {
	pub source_type: SourceType,
	pub provider_ref: String,
	#[serde(default)]
	pub source_uri: Option<String>,
	#[serde(default)]
	pub title: String,
	pub sensitivity: Sensitivity,
	#[serde(default)]
	pub customer_id: Option<i64>,
	#[serde(default)]
	pub ticket_id: Option<i64>,
	#[serde(default)]
	pub thread_id: Option<String>,
	#[serde(default)]
	pub owner_user_id: Option<i64>,
	#[serde(default)]
	pub department: Option<String>,
	#[serde(default = "default_metadata")]
	pub metadata: Value,
	pub raw_text: String,
	#[serde(default, with = "crate::time_serde::rfc3339_option")]
	pub source_created_at: Option<OffsetDateTime>,
	#[serde(default, with = "crate::time_serde::rfc3339_option")]
	pub source_updated_at: Option<OffsetDateTime>,
}

fn default_metadata() -> Value {
	Value::Object(serde_json::Map::new())
}

impl SiftService {
	/// The single write path into the source/chunk store.
	///
	/// Content-hash short-circuit on [`IngestOp::Upsert`], global chunk-hash
	/// embedding reuse, one batched embed call for the misses, then an atomic
	/// delete-then-insert chunk replacement. A provider failure aborts before
	/// any row is written.
	pub async fn upsert_source_with_chunks(
		&self,
		input: &IngestSourceInput,
		op: IngestOp,
	) -> Result<Uuid> {
		let cleaned = normalize::clean(input.source_type, &input.raw_text);
		let content_hash = blake3::hash(cleaned.as_bytes()).to_hex().to_string();
		let existing =
			sources::find_source(&self.db.pool, input.source_type.as_str(), &input.provider_ref)
				.await?;

		if let Some(existing) = &existing
			&& op == IngestOp::Upsert
			&& existing.content_hash == content_hash
		{
			// Same content: refresh metadata and timestamps, then rebuild the
			// points anyway. The point refresh is not transactional with the
			// row commit, so re-running an unchanged source must repair a
			// vector index left stale by a crash between the two. The rebuild
			// reads the embedding cache; no provider call for unchanged text.
			let record = sources::upsert_source(
				&self.db.pool,
				&upsert_args(input, existing.source_id, &content_hash),
			)
			.await?;

			self.rebuild_source_points(&record).await?;

			return Ok(record.source_id);
		}

		let source_id = existing.as_ref().map(|record| record.source_id).unwrap_or_else(Uuid::new_v4);
		let chunk_cfg =
			sift_chunking::config_for(input.source_type, &self.cfg.chunking);
		let chunks = sift_chunking::split_text(&cleaned, &chunk_cfg);
		let version = embedding_version(&self.cfg);
		let now = OffsetDateTime::now_utc();
		let records = chunks
			.iter()
			.map(|chunk| {
				let chunk_hash = blake3::hash(chunk.text.as_bytes()).to_hex().to_string();
				// Derived id: stable for the same source, index, and content.
				let chunk_id = Uuid::new_v5(
					&source_id,
					format!("{}:{chunk_hash}", chunk.chunk_index).as_bytes(),
				);

				ChunkRecord {
					chunk_id,
					source_id,
					chunk_index: chunk.chunk_index,
					chunk_text: chunk.text.clone(),
					chunk_hash,
					created_at: now,
				}
			})
			.collect::<Vec<_>>();
		let vectors = self.resolve_chunk_vectors(&records, &version).await?;

		let mut tx = self.db.pool.begin().await?;
		let record =
			sources::upsert_source(&mut *tx, &upsert_args(input, source_id, &content_hash)).await?;

		sources::replace_chunks(&mut tx, record.source_id, &records).await?;

		for chunk in &records {
			if let Some(vec) = vectors.get(&chunk.chunk_hash) {
				sources::store_embedding(&mut *tx, &chunk.chunk_hash, &version, vec).await?;
			}
		}

		tx.commit().await?;

		self.delete_source_points(record.source_id).await?;
		self.upsert_chunk_points(
			&PointMeta {
				source_type: input.source_type.as_str(),
				sensitivity: input.sensitivity.as_str(),
				customer_id: input.customer_id,
				ticket_id: input.ticket_id,
			},
			record.source_id,
			&records,
			&vectors,
		)
		.await?;

		Ok(record.source_id)
	}

	/// Rebuilds a source's vector points from its stored chunks, re-embedding
	/// only the chunk hashes the cache misses. Used by operator backfills
	/// after an embedding model change; needs no raw text.
	pub async fn reindex_source(&self, source_type: SourceType, provider_ref: &str) -> Result<Uuid> {
		let Some(source) =
			sources::find_source(&self.db.pool, source_type.as_str(), provider_ref).await?
		else {
			return Err(Error::NotFound {
				message: format!("No {} source with ref {provider_ref}.", source_type.as_str()),
			});
		};

		self.rebuild_source_points(&source).await?;

		Ok(source.source_id)
	}

	async fn rebuild_source_points(&self, source: &SourceRecord) -> Result<()> {
		let records = sources::chunks_for_source(&self.db, source.source_id).await?;
		let version = embedding_version(&self.cfg);
		let vectors = self.resolve_chunk_vectors(&records, &version).await?;

		for chunk in &records {
			if let Some(vec) = vectors.get(&chunk.chunk_hash) {
				sources::store_embedding(&self.db.pool, &chunk.chunk_hash, &version, vec).await?;
			}
		}

		self.delete_source_points(source.source_id).await?;
		self.upsert_chunk_points(
			&PointMeta {
				source_type: &source.source_type,
				sensitivity: &source.sensitivity,
				customer_id: source.customer_id,
				ticket_id: source.ticket_id,
			},
			source.source_id,
			&records,
			&vectors,
		)
		.await?;

		Ok(())
	}

	/// Hard-deletes a source, its chunks, and its vector points.
	pub async fn purge_source(&self, source_type: SourceType, provider_ref: &str) -> Result<Uuid> {
		let Some(source_id) =
			sources::delete_source(&self.db, source_type.as_str(), provider_ref).await?
		else {
			return Err(Error::NotFound {
				message: format!("No {} source with ref {provider_ref}.", source_type.as_str()),
			});
		};

		self.delete_source_points(source_id).await?;

		tracing::info!(source_id = %source_id, source_type = source_type.as_str(), "Purged source.");

		Ok(source_id)
	}

	pub async fn enqueue_rag_job(
		&self,
		source_type: SourceType,
		source_ref: &str,
		op: IngestOp,
		payload: &Value,
		priority: i32,
	) -> Result<Uuid> {
		let job_id = jobs::enqueue_job(
			&self.db.pool,
			source_type.as_str(),
			source_ref,
			op.as_str(),
			payload,
			priority,
		)
		.await?;

		Ok(job_id)
	}

	/// Reuses cached vectors by chunk hash and batch-embeds only the misses.
	/// Returns hash -> vector for every distinct chunk hash.
	async fn resolve_chunk_vectors(
		&self,
		records: &[ChunkRecord],
		version: &str,
	) -> Result<HashMap<String, Vec<f32>>> {
		let hashes = records.iter().map(|chunk| chunk.chunk_hash.clone()).collect::<Vec<_>>();
		let mut vectors = sources::cached_embeddings(&self.db, &hashes, version).await?;
		let mut miss_hashes = Vec::new();
		let mut miss_texts = Vec::new();

		for chunk in records {
			if !vectors.contains_key(&chunk.chunk_hash)
				&& !miss_hashes.contains(&chunk.chunk_hash)
			{
				miss_hashes.push(chunk.chunk_hash.clone());
				miss_texts.push(chunk.chunk_text.clone());
			}
		}

		if miss_texts.is_empty() {
			return Ok(vectors);
		}

		let embedded =
			self.providers.embedding.embed(&self.cfg.providers.embedding, &miss_texts).await?;

		if embedded.len() != miss_texts.len() {
			return Err(Error::Provider {
				message: format!(
					"Embedding provider returned {} vectors for {} inputs.",
					embedded.len(),
					miss_texts.len()
				),
			});
		}

		let expected_dim = self.cfg.providers.embedding.dimensions as usize;

		for (hash, vec) in miss_hashes.into_iter().zip(embedded) {
			if vec.len() != expected_dim {
				return Err(Error::Provider {
					message: format!(
						"Embedding vector has dimension {}, expected {expected_dim}.",
						vec.len()
					),
				});
			}

			vectors.insert(hash, vec);
		}

		Ok(vectors)
	}

	async fn delete_source_points(&self, source_id: Uuid) -> Result<()> {
		let filter = Filter::must([Condition::matches("source_id", source_id.to_string())]);
		let delete =
			DeletePointsBuilder::new(self.qdrant.collection.clone()).points(filter).wait(true);

		self.qdrant.client.delete_points(delete).await?;

		Ok(())
	}

	async fn upsert_chunk_points(
		&self,
		meta: &PointMeta<'_>,
		source_id: Uuid,
		records: &[ChunkRecord],
		vectors: &HashMap<String, Vec<f32>>,
	) -> Result<()> {
		let mut points = Vec::with_capacity(records.len());

		for chunk in records {
			let Some(vec) = vectors.get(&chunk.chunk_hash) else {
				continue;
			};
			let mut payload_map = HashMap::new();

			payload_map.insert(
				"source_id".to_string(),
				qdrant_client::qdrant::Value::from(source_id.to_string()),
			);
			payload_map.insert(
				"chunk_id".to_string(),
				qdrant_client::qdrant::Value::from(chunk.chunk_id.to_string()),
			);
			payload_map.insert(
				"chunk_index".to_string(),
				qdrant_client::qdrant::Value::from(i64::from(chunk.chunk_index)),
			);
			payload_map.insert(
				"source_type".to_string(),
				qdrant_client::qdrant::Value::from(meta.source_type),
			);
			payload_map.insert(
				"sensitivity".to_string(),
				qdrant_client::qdrant::Value::from(meta.sensitivity),
			);

			if let Some(customer_id) = meta.customer_id {
				payload_map
					.insert("customer_id".to_string(), qdrant_client::qdrant::Value::from(customer_id));
			}
			if let Some(ticket_id) = meta.ticket_id {
				payload_map
					.insert("ticket_id".to_string(), qdrant_client::qdrant::Value::from(ticket_id));
			}

			let payload = Payload::from(payload_map);
			let mut vector_map = HashMap::new();

			vector_map.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(vec.to_vec()));

			points.push(PointStruct::new(chunk.chunk_id.to_string(), vector_map, payload));
		}

		if points.is_empty() {
			return Ok(());
		}

		let upsert = UpsertPointsBuilder::new(self.qdrant.collection.clone(), points).wait(true);

		self.qdrant.client.upsert_points(upsert).await?;

		Ok(())
	}
}

struct PointMeta<'a> {
	source_type: &'a str,
	sensitivity: &'a str,
	customer_id: Option<i64>,
	ticket_id: Option<i64>,
}

fn upsert_args<'a>(
	input: &'a IngestSourceInput,
	source_id: Uuid,
	content_hash: &'a str,
) -> UpsertSource<'a> {
	UpsertSource {
		source_id,
		source_type: input.source_type.as_str(),
		provider_ref: &input.provider_ref,
		source_uri: input.source_uri.as_deref(),
		title: &input.title,
		sensitivity: input.sensitivity.as_str(),
		customer_id: input.customer_id,
		ticket_id: input.ticket_id,
		thread_id: input.thread_id.as_deref(),
		owner_user_id: input.owner_user_id,
		department: input.department.as_deref(),
		metadata: &input.metadata,
		content_hash,
		source_created_at: input.source_created_at,
		source_updated_at: input.source_updated_at,
	}
}
