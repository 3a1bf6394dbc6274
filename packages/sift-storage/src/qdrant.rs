pub const DENSE_VECTOR_NAME: &str = "dense";

use qdrant_client::qdrant::{
	CreateCollectionBuilder, Distance, VectorParamsBuilder, VectorsConfigBuilder,
};

use crate::Result;

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &sift_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			return Ok(());
		}

		let mut vectors_config = VectorsConfigBuilder::default();

		vectors_config.add_named_vector_params(
			DENSE_VECTOR_NAME,
			VectorParamsBuilder::new(u64::from(self.vector_dim), Distance::Cosine),
		);

		let builder =
			CreateCollectionBuilder::new(self.collection.clone()).vectors_config(vectors_config);

		self.client.create_collection(builder).await?;

		Ok(())
	}
}
