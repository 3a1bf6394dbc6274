use std::sync::Arc;

use sift_service::SiftService;
use sift_storage::{db::Db, qdrant::QdrantStore};

use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<SiftService>,
	pub limiter: Arc<RateLimiter>,
}
impl AppState {
	pub async fn new(config: sift_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;

		qdrant.ensure_collection().await?;

		let limiter = Arc::new(RateLimiter::new(
			config.limits.per_user_per_minute,
			config.limits.per_origin_per_minute,
		));
		let service = SiftService::new(config, db, qdrant);

		Ok(Self { service: Arc::new(service), limiter })
	}
}
