use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub chunking: Chunking,
	pub search: Search,
	pub ranking: Ranking,
	pub ingestion: Ingestion,
	pub limits: Limits,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
	#[serde(default)]
	pub bind_localhost_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Chunking {
	/// Content at or under this length always yields a single chunk.
	pub single_chunk_max_chars: u32,
	pub default_max_chars: u32,
	/// Optional per-source-type overrides, keyed by source type label.
	#[serde(default)]
	pub max_chars_overrides: HashMap<String, u32>,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	pub candidate_k: u32,
	pub default_top_k: u32,
	pub max_top_k: u32,
	pub similar_max_top_k: u32,
}

#[derive(Debug, Deserialize)]
pub struct Ranking {
	pub lexical_weight: f32,
	pub vector_weight: f32,
	pub recency_weight: f32,
	pub recency_tau_days: f32,
	pub rerank_enabled: bool,
	pub rerank_weight: f32,
	pub high_confidence_threshold: f32,
}

#[derive(Debug, Deserialize)]
pub struct Ingestion {
	pub batch_limit: u32,
	pub poll_interval_ms: u64,
	pub base_backoff_ms: i64,
	pub cap_attempts: i32,
	pub max_attempts: i32,
	pub lease_seconds: i64,
}

#[derive(Debug, Deserialize)]
pub struct Limits {
	pub per_user_per_minute: u32,
	pub per_origin_per_minute: u32,
}
