use serde::Serialize;
use serde_json::Value;

use sift_domain::{
	identifiers::ExtractedIdentifiers,
	scope::{CandidateRow, ViewerScope, can_view},
	source::Sensitivity,
};
use sift_storage::entities;

use crate::{Result, SiftService};

#[derive(Clone, Debug, Serialize)]
pub struct TruthResult {
	pub entity_type: String,
	pub label: String,
	pub source_uri: Option<String>,
	pub customer_id: Option<i64>,
	pub data: Value,
}

impl SiftService {
	/// Direct keyed fetches against the business entities the extracted
	/// identifiers name. Always returned alongside semantic evidence, never
	/// instead of it. Results outside the viewer's customer grants are dropped
	/// silently, like any other row-level denial.
	pub(crate) async fn lookup(
		&self,
		identifiers: &ExtractedIdentifiers,
		scope: &ViewerScope,
	) -> Result<Vec<TruthResult>> {
		let mut results = Vec::new();

		if let Some(order_number) = &identifiers.order_number {
			if let Some(order) = entities::order_by_number(&self.db, order_number).await? {
				results.push(TruthResult {
					entity_type: "order".to_string(),
					label: format!("Order {}", order.order_number),
					source_uri: order.source_uri.clone(),
					customer_id: order.customer_id,
					data: order_data(&order),
				});

				for shipment in
					entities::shipments_for_order(&self.db, &order.order_number).await?
				{
					results.push(shipment_result(&shipment));
				}
			}
		}

		// Customers often quote their own PO number where we expect an order
		// number; try it against orders as well.
		if let Some(po_number) = &identifiers.po_number
			&& identifiers.order_number.as_deref() != Some(po_number)
			&& let Some(order) = entities::order_by_number(&self.db, po_number).await?
		{
			results.push(TruthResult {
				entity_type: "order".to_string(),
				label: format!("Order {}", order.order_number),
				source_uri: order.source_uri.clone(),
				customer_id: order.customer_id,
				data: order_data(&order),
			});
		}

		if let Some(invoice_number) = &identifiers.invoice_number {
			if let Some(invoice) = entities::invoice_by_number(&self.db, invoice_number).await? {
				results.push(TruthResult {
					entity_type: "invoice".to_string(),
					label: format!("Invoice {}", invoice.invoice_number),
					source_uri: invoice.source_uri.clone(),
					customer_id: invoice.customer_id,
					data: serde_json::json!({
						"invoice_number": invoice.invoice_number,
						"status": invoice.status,
						"balance": invoice.balance,
						"issued_at": invoice.issued_at.map(|ts| ts.to_string()),
						"detail": invoice.data,
					}),
				});
			} else if let Some(estimate) =
				// Estimates share the invoice numbering shape; fall back when
				// no invoice matches.
				entities::estimate_by_number(&self.db, invoice_number).await?
			{
				results.push(TruthResult {
					entity_type: "estimate".to_string(),
					label: format!("Estimate {}", estimate.estimate_number),
					source_uri: estimate.source_uri.clone(),
					customer_id: estimate.customer_id,
					data: serde_json::json!({
						"estimate_number": estimate.estimate_number,
						"status": estimate.status,
						"issued_at": estimate.issued_at.map(|ts| ts.to_string()),
						"detail": estimate.data,
					}),
				});
			}
		}

		if let Some(tracking_number) = &identifiers.tracking_number
			&& let Some(shipment) =
				entities::shipment_by_tracking(&self.db, tracking_number).await?
		{
			results.push(shipment_result(&shipment));
		}

		// Enrich with the customer snapshot once, from the first scoped hit.
		if let Some(customer_id) = results.iter().find_map(|result| result.customer_id)
			&& let Some(customer) = entities::customer_by_id(&self.db, customer_id).await?
		{
			let recent = entities::recent_orders_for_customer(&self.db, customer_id, 5).await?;

			results.push(TruthResult {
				entity_type: "customer".to_string(),
				label: customer.name.clone(),
				source_uri: None,
				customer_id: Some(customer.customer_id),
				data: serde_json::json!({
					"customer_id": customer.customer_id,
					"name": customer.name,
					"email": customer.email,
					"terms": customer.terms,
					"recent_orders": recent
						.iter()
						.map(|order| serde_json::json!({
							"order_number": order.order_number,
							"status": order.status,
							"placed_at": order.placed_at.map(|ts| ts.to_string()),
						}))
						.collect::<Vec<_>>(),
				}),
			});
		}

		results.retain(|result| {
			can_view(scope, &CandidateRow {
				customer_id: result.customer_id,
				sensitivity: Sensitivity::Public,
				department: None,
			})
		});

		Ok(results)
	}
}

fn order_data(order: &sift_storage::models::CrmOrder) -> Value {
	serde_json::json!({
		"order_number": order.order_number,
		"status": order.status,
		"total": order.total,
		"placed_at": order.placed_at.map(|ts| ts.to_string()),
		"detail": order.data,
	})
}

fn shipment_result(shipment: &sift_storage::models::CrmShipment) -> TruthResult {
	TruthResult {
		entity_type: "shipment".to_string(),
		label: format!("Shipment {}", shipment.tracking_number),
		source_uri: shipment.source_uri.clone(),
		customer_id: shipment.customer_id,
		data: serde_json::json!({
			"tracking_number": shipment.tracking_number,
			"order_number": shipment.order_number,
			"carrier": shipment.carrier,
			"status": shipment.status,
			"shipped_at": shipment.shipped_at.map(|ts| ts.to_string()),
		}),
	}
}
