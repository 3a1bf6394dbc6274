pub mod ingest;
pub mod lookup;
pub mod query;
pub mod search;
pub mod similar;
pub mod time_serde;
pub mod viewer;

mod error;

use std::{future::Future, pin::Pin, sync::Arc};

pub use error::{AccessDeniedReason, Error};
pub use ingest::{IngestOp, IngestSourceInput};
pub use lookup::TruthResult;
pub use query::{Confidence, QueryDebug, QueryFilters, QueryRequest, QueryResponse};
pub use search::{RagResultItem, ScoreBreakdown};
pub use similar::SimilarRequest;

use sift_config::{Config, EmbeddingProviderConfig, ProviderConfig};
use sift_providers::{embedding, rerank};
use sift_storage::{db::Db, qdrant::QdrantStore};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
}

pub struct SiftService {
	pub cfg: Config,
	pub db: Db,
	pub qdrant: QdrantStore,
	pub providers: Providers,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(rerank::rerank(cfg, query, docs))
	}
}

impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, rerank: Arc<dyn RerankProvider>) -> Self {
		Self { embedding, rerank }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), rerank: provider }
	}
}

impl SiftService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Self {
		Self { cfg, db, qdrant, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, db: Db, qdrant: QdrantStore, providers: Providers) -> Self {
		Self { cfg, db, qdrant, providers }
	}
}

/// Embedding cache rows are keyed per provider/model/dimension so a model
/// swap never serves stale vectors.
pub(crate) fn embedding_version(cfg: &Config) -> String {
	format!(
		"{}:{}:{}",
		cfg.providers.embedding.provider_id,
		cfg.providers.embedding.model,
		cfg.providers.embedding.dimensions
	)
}

/// Component-wise average of equal-length vectors; the whole-ticket vector
/// for similarity search.
pub(crate) fn mean_pool(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
	let first = vectors.first()?;
	let mut out = vec![0.0_f32; first.len()];

	for vector in vectors {
		if vector.len() != out.len() {
			return None;
		}

		for (acc, value) in out.iter_mut().zip(vector.iter()) {
			*acc += value;
		}
	}

	let count = vectors.len() as f32;

	for value in &mut out {
		*value /= count;
	}

	Some(out)
}
