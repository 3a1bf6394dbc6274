use serde_json::json;

use sift_domain::{
	intent::QueryIntent,
	source::{Sensitivity, SourceType},
};
use sift_service::{Confidence, IngestOp, IngestSourceInput, QueryRequest};
use sift_storage::entities::{
	self, UpsertCustomer, UpsertEstimate, UpsertInvoice, UpsertOrder, UpsertShipment,
};

use super::suite;

async fn seed_order(service: &sift_service::SiftService) {
	entities::upsert_customer(&service.db.pool, &UpsertCustomer {
		customer_id: 101,
		name: "Acme Fastener Supply",
		email: Some("ops@acme.example"),
		terms: Some("NET30"),
		data: &json!({}),
	})
	.await
	.expect("Customer seed failed.");
	entities::upsert_order(&service.db.pool, &UpsertOrder {
		order_number: "100234",
		customer_id: Some(101),
		status: "shipped",
		total: Some(418.50),
		source_uri: Some("https://shop.example/orders/100234"),
		data: &json!({"items": 3}),
		placed_at: None,
	})
	.await
	.expect("Order seed failed.");
	entities::upsert_shipment(&service.db.pool, &UpsertShipment {
		tracking_number: "1Z999AA10123456784",
		order_number: Some("100234"),
		customer_id: Some(101),
		carrier: Some("UPS"),
		status: "in_transit",
		source_uri: None,
		data: &json!({}),
		shipped_at: None,
	})
	.await
	.expect("Shipment seed failed.");
}

#[tokio::test]
async fn an_order_number_query_returns_truth_beside_evidence() {
	let Some(db) = suite::test_db().await else {
		eprintln!("Skipping; requires SIFT_PG_DSN and SIFT_QDRANT_URL.");

		return;
	};
	let service = suite::service(&db).await;

	seed_order(&service).await;

	service
		.upsert_source_with_chunks(
			&IngestSourceInput {
				source_type: SourceType::Ticket,
				provider_ref: "T-100234".to_string(),
				source_uri: None,
				title: "Where is my order".to_string(),
				sensitivity: Sensitivity::Public,
				customer_id: Some(101),
				ticket_id: Some(5),
				thread_id: None,
				owner_user_id: None,
				department: None,
				metadata: json!({}),
				raw_text: "Customer asking for the status of order 100234, placed last week."
					.to_string(),
				source_created_at: None,
				source_updated_at: None,
			},
			IngestOp::Upsert,
		)
		.await
		.expect("Ingest failed.");

	let scope = suite::agent_scope(&[101]);
	let request = QueryRequest {
		query_text: "status of order 100234".to_string(),
		customer_id: Some(101),
		ticket_id: None,
		filters: None,
		top_k: Some(10),
		debug: false,
	};
	let response = service.query_rag(&scope, &request).await.expect("Query failed.");

	assert_eq!(response.intent, QueryIntent::IdentifierLookup);
	assert_eq!(response.confidence, Confidence::High);
	assert!(response.truth_results.iter().any(|truth| truth.entity_type == "order"));
	assert!(response.truth_results.iter().any(|truth| truth.entity_type == "shipment"));
	assert!(response.truth_results.iter().any(|truth| truth.entity_type == "customer"));
	assert!(response.evidence_results.iter().any(|item| item.snippet.contains("100234")));
}

#[tokio::test]
async fn an_invoice_number_falls_back_to_estimates_when_no_invoice_matches() {
	let Some(db) = suite::test_db().await else {
		eprintln!("Skipping; requires SIFT_PG_DSN and SIFT_QDRANT_URL.");

		return;
	};
	let service = suite::service(&db).await;

	entities::upsert_customer(&service.db.pool, &UpsertCustomer {
		customer_id: 7,
		name: "Northside Machining",
		email: None,
		terms: None,
		data: &json!({}),
	})
	.await
	.expect("Customer seed failed.");
	entities::upsert_invoice(&service.db.pool, &UpsertInvoice {
		invoice_number: "55012",
		customer_id: Some(7),
		status: "open",
		balance: Some(1_250.00),
		source_uri: None,
		data: &json!({}),
		issued_at: None,
	})
	.await
	.expect("Invoice seed failed.");
	entities::upsert_estimate(&service.db.pool, &UpsertEstimate {
		estimate_number: "88031",
		customer_id: Some(7),
		status: "sent",
		source_uri: None,
		data: &json!({}),
		issued_at: None,
	})
	.await
	.expect("Estimate seed failed.");

	let scope = suite::agent_scope(&[7]);
	let invoice_request = QueryRequest {
		query_text: "balance on invoice 55012".to_string(),
		customer_id: Some(7),
		ticket_id: None,
		filters: None,
		top_k: Some(10),
		debug: false,
	};
	let response = service.query_rag(&scope, &invoice_request).await.expect("Query failed.");

	assert!(response.truth_results.iter().any(|truth| truth.entity_type == "invoice"));
	assert!(!response.truth_results.iter().any(|truth| truth.entity_type == "estimate"));

	// The same number shape with no matching invoice resolves as an estimate.
	let estimate_request = QueryRequest {
		query_text: "balance on invoice 88031".to_string(),
		customer_id: Some(7),
		ticket_id: None,
		filters: None,
		top_k: Some(10),
		debug: false,
	};
	let response = service.query_rag(&scope, &estimate_request).await.expect("Query failed.");

	assert!(response.truth_results.iter().any(|truth| truth.entity_type == "estimate"));
	assert!(!response.truth_results.iter().any(|truth| truth.entity_type == "invoice"));
}
