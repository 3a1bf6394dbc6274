use serde_json::json;

use sift_domain::source::{Sensitivity, SourceType};
use sift_service::{Error, IngestOp, IngestSourceInput, SimilarRequest};

use super::suite;

fn ticket_input(provider_ref: &str, ticket_id: i64, raw_text: &str) -> IngestSourceInput {
	IngestSourceInput {
		source_type: SourceType::Ticket,
		provider_ref: provider_ref.to_string(),
		source_uri: None,
		title: format!("Ticket {ticket_id}"),
		sensitivity: Sensitivity::Public,
		customer_id: Some(7),
		ticket_id: Some(ticket_id),
		thread_id: None,
		owner_user_id: None,
		department: None,
		metadata: json!({}),
		raw_text: raw_text.to_string(),
		source_created_at: None,
		source_updated_at: None,
	}
}

#[tokio::test]
async fn the_probe_ticket_never_matches_itself() {
	let Some(db) = suite::test_db().await else {
		eprintln!("Skipping; requires SIFT_PG_DSN and SIFT_QDRANT_URL.");

		return;
	};
	let service = suite::service(&db).await;
	let body = "Tracking says delivered but the customer has no package.";

	service
		.upsert_source_with_chunks(&ticket_input("S-1", 1, body), IngestOp::Upsert)
		.await
		.expect("Ingest failed.");
	service
		.upsert_source_with_chunks(&ticket_input("S-2", 2, body), IngestOp::Upsert)
		.await
		.expect("Ingest failed.");

	let scope = suite::admin_scope();
	let request = SimilarRequest { ticket_id: 1, top_k: Some(10), include_internal: None };
	let results =
		service.find_similar_tickets(&scope, &request).await.expect("Similar lookup failed.");

	assert!(results.iter().all(|item| item.ticket_id != Some(1)));
	assert!(results.iter().any(|item| item.ticket_id == Some(2)));
}

#[tokio::test]
async fn a_ticket_with_no_indexed_sources_is_not_found() {
	let Some(db) = suite::test_db().await else {
		eprintln!("Skipping; requires SIFT_PG_DSN and SIFT_QDRANT_URL.");

		return;
	};
	let service = suite::service(&db).await;
	let scope = suite::admin_scope();
	let request = SimilarRequest { ticket_id: 999, top_k: None, include_internal: None };
	let err = service.find_similar_tickets(&scope, &request).await.unwrap_err();

	assert!(matches!(err, Error::NotFound { .. }));
}
