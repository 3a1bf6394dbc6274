use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static UPS_TRACKING: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\b1Z[0-9A-Z]{16}\b").unwrap());
static USPS_TRACKING: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\b9[2-5]\d{20,24}\b").unwrap());
static FEDEX_TRACKING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{15}\b").unwrap());
static SHIPPING_CONTEXT: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)\b(track(ing|ed)?|fedex|ship(ment|ped|ping)?|carrier|delivery|delivered)\b")
		.unwrap()
});
static PO_NUMBER: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)\bP\.?O\.?[-#\s]*(\d{4,10})\b").unwrap());
static INVOICE_NUMBER: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)\b(?:INV[-#]?|invoice\s*#?\s*)(\d{3,10})\b").unwrap());
static ORDER_NUMBER: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)\border\s*#?\s*(\d{5,10})\b").unwrap());
static BARE_ORDER_NUMBER: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"#(\d{5,10})\b").unwrap());
static SKU: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z]{2,5}-\d{3,6}\b").unwrap());

/// Structured identifiers parsed out of free text. All fields optional; the
/// first match of each kind wins.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ExtractedIdentifiers {
	pub order_number: Option<String>,
	pub invoice_number: Option<String>,
	pub tracking_number: Option<String>,
	pub sku: Option<String>,
	pub po_number: Option<String>,
}
impl ExtractedIdentifiers {
	pub fn is_empty(&self) -> bool {
		self.order_number.is_none()
			&& self.invoice_number.is_none()
			&& self.tracking_number.is_none()
			&& self.sku.is_none()
			&& self.po_number.is_none()
	}
}

pub fn extract_identifiers(text: &str) -> ExtractedIdentifiers {
	// UPS and USPS formats are distinctive; a bare 15-digit number is only a
	// FedEx tracking number next to shipping language. Account and phone
	// numbers share the shape.
	let tracking_number = UPS_TRACKING
		.find(text)
		.or_else(|| USPS_TRACKING.find(text))
		.or_else(|| {
			if SHIPPING_CONTEXT.is_match(text) { FEDEX_TRACKING.find(text) } else { None }
		})
		.map(|m| m.as_str().to_string());
	let po_number = PO_NUMBER.captures(text).map(|caps| caps[1].to_string());
	let invoice_number = INVOICE_NUMBER.captures(text).map(|caps| caps[1].to_string());
	let order_number = ORDER_NUMBER
		.captures(text)
		.or_else(|| BARE_ORDER_NUMBER.captures(text))
		.map(|caps| caps[1].to_string())
		// A bare #number already claimed as a PO or invoice is not an order.
		.filter(|number| {
			Some(number) != po_number.as_ref() && Some(number) != invoice_number.as_ref()
		});
	// PO and invoice codes share the letters-dash-digits shape; a match whose
	// digits are already claimed is not a SKU.
	let sku = SKU
		.find_iter(text)
		.map(|m| m.as_str())
		.find(|candidate| {
			let digits = candidate.rsplit('-').next();

			digits != po_number.as_deref() && digits != invoice_number.as_deref()
		})
		.map(str::to_string);

	ExtractedIdentifiers { order_number, invoice_number, tracking_number, sku, po_number }
}

/// True when the text carries any identifier the normalizer must preserve.
pub fn contains_identifier(text: &str) -> bool {
	!extract_identifiers(text).is_empty()
}
