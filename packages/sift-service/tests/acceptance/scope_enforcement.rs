use serde_json::json;

use sift_domain::source::{Sensitivity, SourceType};
use sift_service::{
	AccessDeniedReason, Error, IngestOp, IngestSourceInput, QueryFilters, QueryRequest,
};

use super::suite;

fn kb_input(provider_ref: &str, customer_id: Option<i64>, raw_text: &str) -> IngestSourceInput {
	IngestSourceInput {
		source_type: SourceType::Interaction,
		provider_ref: provider_ref.to_string(),
		source_uri: None,
		title: format!("Note {provider_ref}"),
		sensitivity: Sensitivity::Public,
		customer_id,
		ticket_id: None,
		thread_id: None,
		owner_user_id: None,
		department: None,
		metadata: json!({}),
		raw_text: raw_text.to_string(),
		source_created_at: None,
		source_updated_at: None,
	}
}

fn request(customer_id: Option<i64>, allow_global: bool) -> QueryRequest {
	QueryRequest {
		query_text: "refund policy for damaged shipments".to_string(),
		customer_id,
		ticket_id: None,
		filters: Some(QueryFilters { allow_global, ..Default::default() }),
		top_k: Some(10),
		debug: false,
	}
}

#[tokio::test]
async fn a_non_admin_query_without_context_is_denied_before_retrieval() {
	let Some(db) = suite::test_db().await else {
		eprintln!("Skipping; requires SIFT_PG_DSN and SIFT_QDRANT_URL.");

		return;
	};
	let service = suite::service(&db).await;
	let scope = suite::agent_scope(&[7]);
	let err = service.query_rag(&scope, &request(None, false)).await.unwrap_err();

	assert!(matches!(err, Error::AccessDenied { reason: AccessDeniedReason::MissingContext }));
}

#[tokio::test]
async fn an_admin_needs_the_global_opt_in_for_unscoped_queries() {
	let Some(db) = suite::test_db().await else {
		eprintln!("Skipping; requires SIFT_PG_DSN and SIFT_QDRANT_URL.");

		return;
	};
	let service = suite::service(&db).await;
	let scope = suite::admin_scope();
	let err = service.query_rag(&scope, &request(None, false)).await.unwrap_err();

	assert!(matches!(err, Error::AccessDenied { reason: AccessDeniedReason::GlobalNotAllowed }));

	let response = service
		.query_rag(&scope, &request(None, true))
		.await
		.expect("Opted-in global query failed.");

	assert!(response.truth_results.is_empty());
}

#[tokio::test]
async fn another_customers_rows_never_reach_the_results() {
	let Some(db) = suite::test_db().await else {
		eprintln!("Skipping; requires SIFT_PG_DSN and SIFT_QDRANT_URL.");

		return;
	};
	let service = suite::service(&db).await;

	for (provider_ref, customer_id) in
		[("N-7", Some(7)), ("N-8", Some(8)), ("N-G", None)]
	{
		service
			.upsert_source_with_chunks(
				&kb_input(
					provider_ref,
					customer_id,
					"Our refund policy covers damaged shipments within 30 days.",
				),
				IngestOp::Upsert,
			)
			.await
			.expect("Ingest failed.");
	}

	let scope = suite::agent_scope(&[7]);
	let response =
		service.query_rag(&scope, &request(Some(7), false)).await.expect("Query failed.");

	assert!(!response.evidence_results.is_empty());
	assert!(
		response
			.evidence_results
			.iter()
			.all(|item| item.customer_id.is_none() || item.customer_id == Some(7))
	);
}
