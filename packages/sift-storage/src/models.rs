use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceRecord {
	pub source_id: Uuid,
	pub source_type: String,
	pub provider_ref: String,
	pub source_uri: Option<String>,
	pub title: String,
	pub sensitivity: String,
	pub customer_id: Option<i64>,
	pub ticket_id: Option<i64>,
	pub thread_id: Option<String>,
	pub owner_user_id: Option<i64>,
	pub department: Option<String>,
	pub metadata: Value,
	pub content_hash: String,
	pub source_created_at: Option<OffsetDateTime>,
	pub source_updated_at: Option<OffsetDateTime>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChunkRecord {
	pub chunk_id: Uuid,
	pub source_id: Uuid,
	pub chunk_index: i32,
	pub chunk_text: String,
	pub chunk_hash: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ChunkEmbedding {
	pub chunk_hash: String,
	pub embedding_version: String,
	pub embedding_dim: i32,
	pub vec: Vec<f32>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IngestionJob {
	pub job_id: Uuid,
	pub source_type: String,
	pub source_ref: String,
	pub op: String,
	pub payload: Value,
	pub status: String,
	pub priority: i32,
	pub attempts: i32,
	pub last_error: Option<String>,
	pub next_run_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

/// A retrieval candidate with everything access control and ranking need,
/// hydrated from `rag_chunks` joined to `rag_sources`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CandidateChunk {
	pub chunk_id: Uuid,
	pub source_id: Uuid,
	pub chunk_index: i32,
	pub chunk_text: String,
	pub source_type: String,
	pub provider_ref: String,
	pub source_uri: Option<String>,
	pub title: String,
	pub sensitivity: String,
	pub customer_id: Option<i64>,
	pub ticket_id: Option<i64>,
	pub department: Option<String>,
	pub metadata: Value,
	pub source_created_at: Option<OffsetDateTime>,
	pub source_updated_at: Option<OffsetDateTime>,
	pub fts_rank: Option<f32>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct AppUser {
	pub user_id: i64,
	pub role: String,
	pub is_external: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CrmCustomer {
	pub customer_id: i64,
	pub name: String,
	pub email: Option<String>,
	pub terms: Option<String>,
	pub data: Value,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CrmOrder {
	pub order_id: Uuid,
	pub order_number: String,
	pub customer_id: Option<i64>,
	pub status: String,
	pub total: Option<f64>,
	pub source_uri: Option<String>,
	pub data: Value,
	pub placed_at: Option<OffsetDateTime>,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CrmInvoice {
	pub invoice_id: Uuid,
	pub invoice_number: String,
	pub customer_id: Option<i64>,
	pub status: String,
	pub balance: Option<f64>,
	pub source_uri: Option<String>,
	pub data: Value,
	pub issued_at: Option<OffsetDateTime>,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CrmEstimate {
	pub estimate_id: Uuid,
	pub estimate_number: String,
	pub customer_id: Option<i64>,
	pub status: String,
	pub source_uri: Option<String>,
	pub data: Value,
	pub issued_at: Option<OffsetDateTime>,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CrmShipment {
	pub shipment_id: Uuid,
	pub tracking_number: String,
	pub order_number: Option<String>,
	pub customer_id: Option<i64>,
	pub carrier: Option<String>,
	pub status: String,
	pub source_uri: Option<String>,
	pub data: Value,
	pub shipped_at: Option<OffsetDateTime>,
	pub updated_at: OffsetDateTime,
}
