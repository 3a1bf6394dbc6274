//! Shared harness for the acceptance tests. Every test needs a live Postgres
//! and Qdrant, addressed by SIFT_PG_DSN and SIFT_QDRANT_URL; tests skip
//! themselves when either is absent.

use std::{
	collections::{HashMap, HashSet},
	hash::{DefaultHasher, Hash, Hasher},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};

use serde_json::{Map, Value};

use sift_config::{
	Chunking, Config, EmbeddingProviderConfig, Ingestion, Limits, Postgres, ProviderConfig,
	Qdrant, Ranking, Search, Service,
};
use sift_domain::scope::{DEPARTMENT_WILDCARD, Role, ViewerScope};
use sift_service::{BoxFuture, EmbeddingProvider, Providers, RerankProvider, SiftService};
use sift_storage::{db::Db, qdrant::QdrantStore};
use sift_testkit::TestDatabase;

pub const TEST_VECTOR_DIM: u32 = 8;

/// Deterministic per-text vectors so cosine similarity is meaningful without
/// a real embedding provider. Identical texts always embed identically.
pub fn pseudo_vector(text: &str, dim: usize) -> Vec<f32> {
	let mut hasher = DefaultHasher::new();

	text.hash(&mut hasher);

	let mut seed = hasher.finish();
	let mut vector = Vec::with_capacity(dim);

	for _ in 0..dim {
		seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
		vector.push(((seed >> 33) as u32 as f32 / u32::MAX as f32) * 2.0 - 1.0);
	}

	vector
}

pub struct StubEmbedding {
	pub vector_dim: u32,
}
impl EmbeddingProvider for StubEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		let dim = self.vector_dim as usize;
		let vectors = texts.iter().map(|text| pseudo_vector(text, dim)).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

pub struct SpyEmbedding {
	pub vector_dim: u32,
	pub calls: Arc<AtomicUsize>,
	pub texts_embedded: Arc<AtomicUsize>,
}
impl EmbeddingProvider for SpyEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);

		let dim = self.vector_dim as usize;
		let vectors = texts.iter().map(|text| pseudo_vector(text, dim)).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

pub struct StubRerank;
impl RerankProvider for StubRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		let scores = vec![0.5; docs.len()];

		Box::pin(async move { Ok(scores) })
	}
}

pub async fn test_db() -> Option<TestDatabase> {
	let base_dsn = sift_testkit::env_dsn()?;
	let db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");

	Some(db)
}

pub fn test_qdrant_url() -> Option<String> {
	sift_testkit::env_qdrant_url()
}

pub fn test_config(dsn: String, qdrant_url: String, collection: String) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			admin_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
			bind_localhost_only: true,
		},
		storage: sift_config::Storage {
			postgres: Postgres { dsn, pool_max_conns: 2 },
			qdrant: Qdrant { url: qdrant_url, collection, vector_dim: TEST_VECTOR_DIM },
		},
		providers: sift_config::Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "unused".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "stub-embed".to_string(),
				dimensions: TEST_VECTOR_DIM,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			rerank: ProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "unused".to_string(),
				path: "/v1/rerank".to_string(),
				model: "stub-rerank".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		chunking: Chunking {
			single_chunk_max_chars: 200,
			default_max_chars: 400,
			max_chars_overrides: HashMap::new(),
		},
		search: Search { candidate_k: 50, default_top_k: 10, max_top_k: 50, similar_max_top_k: 20 },
		ranking: Ranking {
			lexical_weight: 0.5,
			vector_weight: 0.5,
			recency_weight: 0.1,
			recency_tau_days: 30.0,
			rerank_enabled: false,
			rerank_weight: 0.0,
			high_confidence_threshold: 0.6,
		},
		ingestion: Ingestion {
			batch_limit: 10,
			poll_interval_ms: 50,
			base_backoff_ms: 100,
			cap_attempts: 5,
			max_attempts: 3,
			lease_seconds: 30,
		},
		limits: Limits { per_user_per_minute: 1_000, per_origin_per_minute: 1_000 },
	}
}

pub async fn service_with(db: &TestDatabase, providers: Providers) -> SiftService {
	let qdrant_url = test_qdrant_url().expect("SIFT_QDRANT_URL must be set.");
	let collection = db.collection_name("sift_acceptance");
	let cfg = test_config(db.dsn().to_string(), qdrant_url, collection);
	let pg = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	pg.ensure_schema().await.expect("Failed to apply schema.");

	let qdrant = QdrantStore::new(&cfg.storage.qdrant).expect("Failed to build Qdrant client.");

	qdrant.ensure_collection().await.expect("Failed to ensure Qdrant collection.");

	SiftService::with_providers(cfg, pg, qdrant, providers)
}

pub async fn service(db: &TestDatabase) -> SiftService {
	let providers = Providers::new(
		Arc::new(StubEmbedding { vector_dim: TEST_VECTOR_DIM }),
		Arc::new(StubRerank),
	);

	service_with(db, providers).await
}

pub fn admin_scope() -> ViewerScope {
	ViewerScope {
		user_id: 1,
		role: Role::Admin,
		is_external: false,
		allow_internal: true,
		allowed_customer_ids: HashSet::new(),
		allowed_departments: [DEPARTMENT_WILDCARD.to_string()].into_iter().collect(),
	}
}

pub fn agent_scope(customer_ids: &[i64]) -> ViewerScope {
	ViewerScope {
		user_id: 2,
		role: Role::User,
		is_external: false,
		allow_internal: true,
		allowed_customer_ids: customer_ids.iter().copied().collect(),
		allowed_departments: HashSet::new(),
	}
}
