use serde_json::Value;
use sqlx::PgExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	models::{CrmCustomer, CrmEstimate, CrmInvoice, CrmOrder, CrmShipment},
};

pub async fn order_by_number(db: &Db, order_number: &str) -> Result<Option<CrmOrder>> {
	let row = sqlx::query_as::<_, CrmOrder>(
		"\
SELECT order_id, order_number, customer_id, status, total, source_uri, data, placed_at, updated_at
FROM crm_orders
WHERE order_number = $1",
	)
	.bind(order_number)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

pub async fn invoice_by_number(db: &Db, invoice_number: &str) -> Result<Option<CrmInvoice>> {
	let row = sqlx::query_as::<_, CrmInvoice>(
		"\
SELECT invoice_id, invoice_number, customer_id, status, balance, source_uri, data, issued_at, updated_at
FROM crm_invoices
WHERE invoice_number = $1",
	)
	.bind(invoice_number)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

pub async fn estimate_by_number(db: &Db, estimate_number: &str) -> Result<Option<CrmEstimate>> {
	let row = sqlx::query_as::<_, CrmEstimate>(
		"\
SELECT estimate_id, estimate_number, customer_id, status, source_uri, data, issued_at, updated_at
FROM crm_estimates
WHERE estimate_number = $1",
	)
	.bind(estimate_number)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

pub async fn shipment_by_tracking(db: &Db, tracking_number: &str) -> Result<Option<CrmShipment>> {
	let row = sqlx::query_as::<_, CrmShipment>(
		"\
SELECT shipment_id, tracking_number, order_number, customer_id, carrier, status, source_uri, data, shipped_at, updated_at
FROM crm_shipments
WHERE tracking_number = $1",
	)
	.bind(tracking_number)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

pub async fn shipments_for_order(db: &Db, order_number: &str) -> Result<Vec<CrmShipment>> {
	let rows = sqlx::query_as::<_, CrmShipment>(
		"\
SELECT shipment_id, tracking_number, order_number, customer_id, carrier, status, source_uri, data, shipped_at, updated_at
FROM crm_shipments
WHERE order_number = $1
ORDER BY shipped_at DESC NULLS LAST",
	)
	.bind(order_number)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn customer_by_id(db: &Db, customer_id: i64) -> Result<Option<CrmCustomer>> {
	let row = sqlx::query_as::<_, CrmCustomer>(
		"SELECT customer_id, name, email, terms, data, updated_at FROM crm_customers WHERE customer_id = $1",
	)
	.bind(customer_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

pub async fn recent_orders_for_customer(
	db: &Db,
	customer_id: i64,
	limit: i64,
) -> Result<Vec<CrmOrder>> {
	let rows = sqlx::query_as::<_, CrmOrder>(
		"\
SELECT order_id, order_number, customer_id, status, total, source_uri, data, placed_at, updated_at
FROM crm_orders
WHERE customer_id = $1
ORDER BY placed_at DESC NULLS LAST
LIMIT $2",
	)
	.bind(customer_id)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub struct UpsertOrder<'a> {
	pub order_number: &'a str,
	pub customer_id: Option<i64>,
	pub status: &'a str,
	pub total: Option<f64>,
	pub source_uri: Option<&'a str>,
	pub data: &'a Value,
	pub placed_at: Option<OffsetDateTime>,
}

pub async fn upsert_order<'e, E>(executor: E, input: &UpsertOrder<'_>) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO crm_orders (order_id, order_number, customer_id, status, total, source_uri, data, placed_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
ON CONFLICT (order_number) DO UPDATE SET
\tcustomer_id = EXCLUDED.customer_id,
\tstatus = EXCLUDED.status,
\ttotal = EXCLUDED.total,
\tsource_uri = EXCLUDED.source_uri,
\tdata = EXCLUDED.data,
\tplaced_at = EXCLUDED.placed_at,
\tupdated_at = now()",
	)
	.bind(Uuid::new_v4())
	.bind(input.order_number)
	.bind(input.customer_id)
	.bind(input.status)
	.bind(input.total)
	.bind(input.source_uri)
	.bind(input.data)
	.bind(input.placed_at)
	.execute(executor)
	.await?;

	Ok(())
}

pub struct UpsertInvoice<'a> {
	pub invoice_number: &'a str,
	pub customer_id: Option<i64>,
	pub status: &'a str,
	pub balance: Option<f64>,
	pub source_uri: Option<&'a str>,
	pub data: &'a Value,
	pub issued_at: Option<OffsetDateTime>,
}

pub async fn upsert_invoice<'e, E>(executor: E, input: &UpsertInvoice<'_>) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO crm_invoices (invoice_id, invoice_number, customer_id, status, balance, source_uri, data, issued_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
ON CONFLICT (invoice_number) DO UPDATE SET
\tcustomer_id = EXCLUDED.customer_id,
\tstatus = EXCLUDED.status,
\tbalance = EXCLUDED.balance,
\tsource_uri = EXCLUDED.source_uri,
\tdata = EXCLUDED.data,
\tissued_at = EXCLUDED.issued_at,
\tupdated_at = now()",
	)
	.bind(Uuid::new_v4())
	.bind(input.invoice_number)
	.bind(input.customer_id)
	.bind(input.status)
	.bind(input.balance)
	.bind(input.source_uri)
	.bind(input.data)
	.bind(input.issued_at)
	.execute(executor)
	.await?;

	Ok(())
}

pub struct UpsertEstimate<'a> {
	pub estimate_number: &'a str,
	pub customer_id: Option<i64>,
	pub status: &'a str,
	pub source_uri: Option<&'a str>,
	pub data: &'a Value,
	pub issued_at: Option<OffsetDateTime>,
}

pub async fn upsert_estimate<'e, E>(executor: E, input: &UpsertEstimate<'_>) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO crm_estimates (estimate_id, estimate_number, customer_id, status, source_uri, data, issued_at)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (estimate_number) DO UPDATE SET
\tcustomer_id = EXCLUDED.customer_id,
\tstatus = EXCLUDED.status,
\tsource_uri = EXCLUDED.source_uri,
\tdata = EXCLUDED.data,
\tissued_at = EXCLUDED.issued_at,
\tupdated_at = now()",
	)
	.bind(Uuid::new_v4())
	.bind(input.estimate_number)
	.bind(input.customer_id)
	.bind(input.status)
	.bind(input.source_uri)
	.bind(input.data)
	.bind(input.issued_at)
	.execute(executor)
	.await?;

	Ok(())
}

pub struct UpsertShipment<'a> {
	pub tracking_number: &'a str,
	pub order_number: Option<&'a str>,
	pub customer_id: Option<i64>,
	pub carrier: Option<&'a str>,
	pub status: &'a str,
	pub source_uri: Option<&'a str>,
	pub data: &'a Value,
	pub shipped_at: Option<OffsetDateTime>,
}

pub async fn upsert_shipment<'e, E>(executor: E, input: &UpsertShipment<'_>) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO crm_shipments (shipment_id, tracking_number, order_number, customer_id, carrier, status, source_uri, data, shipped_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
ON CONFLICT (tracking_number) DO UPDATE SET
\torder_number = EXCLUDED.order_number,
\tcustomer_id = EXCLUDED.customer_id,
\tcarrier = EXCLUDED.carrier,
\tstatus = EXCLUDED.status,
\tsource_uri = EXCLUDED.source_uri,
\tdata = EXCLUDED.data,
\tshipped_at = EXCLUDED.shipped_at,
\tupdated_at = now()",
	)
	.bind(Uuid::new_v4())
	.bind(input.tracking_number)
	.bind(input.order_number)
	.bind(input.customer_id)
	.bind(input.carrier)
	.bind(input.status)
	.bind(input.source_uri)
	.bind(input.data)
	.bind(input.shipped_at)
	.execute(executor)
	.await?;

	Ok(())
}

pub struct UpsertCustomer<'a> {
	pub customer_id: i64,
	pub name: &'a str,
	pub email: Option<&'a str>,
	pub terms: Option<&'a str>,
	pub data: &'a Value,
}

pub async fn upsert_customer<'e, E>(executor: E, input: &UpsertCustomer<'_>) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO crm_customers (customer_id, name, email, terms, data)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (customer_id) DO UPDATE SET
\tname = EXCLUDED.name,
\temail = EXCLUDED.email,
\tterms = EXCLUDED.terms,
\tdata = EXCLUDED.data,
\tupdated_at = now()",
	)
	.bind(input.customer_id)
	.bind(input.name)
	.bind(input.email)
	.bind(input.terms)
	.bind(input.data)
	.execute(executor)
	.await?;

	Ok(())
}
