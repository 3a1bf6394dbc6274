use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};

use qdrant_client::qdrant::{Condition, CountPointsBuilder, DeletePointsBuilder, Filter};
use serde_json::json;

use sift_domain::source::{Sensitivity, SourceType};
use sift_service::{IngestOp, IngestSourceInput, Providers, SiftService};
use sift_storage::sources;

use super::suite::{self, SpyEmbedding, StubRerank, TEST_VECTOR_DIM};

fn ticket_input(provider_ref: &str, raw_text: &str) -> IngestSourceInput {
	IngestSourceInput {
		source_type: SourceType::Ticket,
		provider_ref: provider_ref.to_string(),
		source_uri: Some(format!("https://desk.example/tickets/{provider_ref}")),
		title: "Order never arrived".to_string(),
		sensitivity: Sensitivity::Public,
		customer_id: Some(7),
		ticket_id: Some(1_001),
		thread_id: None,
		owner_user_id: None,
		department: None,
		metadata: json!({"channel": "web"}),
		raw_text: raw_text.to_string(),
		source_created_at: None,
		source_updated_at: None,
	}
}

async fn spy_service(db: &sift_testkit::TestDatabase) -> (SiftService, Arc<AtomicUsize>, Arc<AtomicUsize>) {
	let calls = Arc::new(AtomicUsize::new(0));
	let texts = Arc::new(AtomicUsize::new(0));
	let providers = Providers::new(
		Arc::new(SpyEmbedding {
			vector_dim: TEST_VECTOR_DIM,
			calls: calls.clone(),
			texts_embedded: texts.clone(),
		}),
		Arc::new(StubRerank),
	);
	let service = suite::service_with(db, providers).await;

	(service, calls, texts)
}

#[tokio::test]
async fn unchanged_content_skips_chunking_and_embedding() {
	let Some(db) = suite::test_db().await else {
		eprintln!("Skipping; requires SIFT_PG_DSN and SIFT_QDRANT_URL.");

		return;
	};
	let (service, calls, _) = spy_service(&db).await;
	let input = ticket_input("T-1", "The package shows delivered but nothing arrived.");
	let first = service
		.upsert_source_with_chunks(&input, IngestOp::Upsert)
		.await
		.expect("First ingest failed.");
	let second = service
		.upsert_source_with_chunks(&input, IngestOp::Upsert)
		.await
		.expect("Second ingest failed.");

	assert_eq!(first, second);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn identical_chunks_across_sources_reuse_cached_vectors() {
	let Some(db) = suite::test_db().await else {
		eprintln!("Skipping; requires SIFT_PG_DSN and SIFT_QDRANT_URL.");

		return;
	};
	let (service, calls, texts) = spy_service(&db).await;
	let body = "Return window is 30 days from the delivery date.";

	service
		.upsert_source_with_chunks(&ticket_input("T-2", body), IngestOp::Upsert)
		.await
		.expect("First ingest failed.");
	service
		.upsert_source_with_chunks(&ticket_input("T-3", body), IngestOp::Upsert)
		.await
		.expect("Second ingest failed.");

	// The second source hits the chunk-hash cache and never reaches the
	// provider.
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(texts.load(Ordering::SeqCst), 1);
}

async fn point_count(service: &SiftService, source_id: uuid::Uuid) -> u64 {
	let filter = Filter::must([Condition::matches("source_id", source_id.to_string())]);
	let count = service
		.qdrant
		.client
		.count(CountPointsBuilder::new(service.qdrant.collection.clone()).filter(filter).exact(true))
		.await
		.expect("Point count failed.");

	count.result.map(|result| result.count).unwrap_or(0)
}

#[tokio::test]
async fn an_unchanged_upsert_repairs_missing_vector_points() {
	let Some(db) = suite::test_db().await else {
		eprintln!("Skipping; requires SIFT_PG_DSN and SIFT_QDRANT_URL.");

		return;
	};
	let (service, calls, _) = spy_service(&db).await;
	let input = ticket_input("T-5", "Replacement unit ships after the return scan.");
	let source_id = service
		.upsert_source_with_chunks(&input, IngestOp::Upsert)
		.await
		.expect("First ingest failed.");

	assert!(point_count(&service, source_id).await > 0);

	// A crash between the row commit and the point refresh leaves the rows
	// current and the vector index empty for this source.
	let filter = Filter::must([Condition::matches("source_id", source_id.to_string())]);

	service
		.qdrant
		.client
		.delete_points(
			DeletePointsBuilder::new(service.qdrant.collection.clone()).points(filter).wait(true),
		)
		.await
		.expect("Point delete failed.");

	assert_eq!(point_count(&service, source_id).await, 0);

	let repaired = service
		.upsert_source_with_chunks(&input, IngestOp::Upsert)
		.await
		.expect("Repair ingest failed.");

	assert_eq!(repaired, source_id);
	assert!(point_count(&service, source_id).await > 0);
	// Unchanged text resolves from the embedding cache, not the provider.
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn changed_content_replaces_chunks_under_the_same_source() {
	let Some(db) = suite::test_db().await else {
		eprintln!("Skipping; requires SIFT_PG_DSN and SIFT_QDRANT_URL.");

		return;
	};
	let service = suite::service(&db).await;
	let first = service
		.upsert_source_with_chunks(
			&ticket_input("T-4", "Original complaint text."),
			IngestOp::Upsert,
		)
		.await
		.expect("First ingest failed.");
	let second = service
		.upsert_source_with_chunks(
			&ticket_input("T-4", "Edited complaint text with more detail."),
			IngestOp::Upsert,
		)
		.await
		.expect("Second ingest failed.");

	assert_eq!(first, second);

	let chunks =
		sources::chunks_for_source(&service.db, second).await.expect("Failed to load chunks.");

	assert!(!chunks.is_empty());
	assert!(chunks.iter().all(|chunk| chunk.chunk_text.contains("Edited")));
}
