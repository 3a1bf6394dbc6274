use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
	Ticket,
	TicketComment,
	Email,
	Interaction,
	Order,
	QboInvoice,
	QboEstimate,
	QboCustomer,
	ShopifyOrder,
	ShopifyCustomer,
	AmazonOrder,
	ShipstationShipment,
}
impl SourceType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Ticket => "ticket",
			Self::TicketComment => "ticket_comment",
			Self::Email => "email",
			Self::Interaction => "interaction",
			Self::Order => "order",
			Self::QboInvoice => "qbo_invoice",
			Self::QboEstimate => "qbo_estimate",
			Self::QboCustomer => "qbo_customer",
			Self::ShopifyOrder => "shopify_order",
			Self::ShopifyCustomer => "shopify_customer",
			Self::AmazonOrder => "amazon_order",
			Self::ShipstationShipment => "shipstation_shipment",
		}
	}

	pub fn parse(label: &str) -> Option<Self> {
		Self::all().iter().copied().find(|source_type| source_type.as_str() == label)
	}

	pub fn all() -> &'static [Self] {
		&[
			Self::Ticket,
			Self::TicketComment,
			Self::Email,
			Self::Interaction,
			Self::Order,
			Self::QboInvoice,
			Self::QboEstimate,
			Self::QboCustomer,
			Self::ShopifyOrder,
			Self::ShopifyCustomer,
			Self::AmazonOrder,
			Self::ShipstationShipment,
		]
	}

	/// Conversational sources carry quoted replies, signatures, and footers;
	/// structured sources are connector exports that only need whitespace cleanup.
	pub fn is_conversational(self) -> bool {
		matches!(self, Self::Ticket | Self::TicketComment | Self::Email | Self::Interaction)
	}
}
impl std::fmt::Display for SourceType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
	#[default]
	Public,
	Internal,
}
impl Sensitivity {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Public => "public",
			Self::Internal => "internal",
		}
	}

	pub fn parse(label: &str) -> Option<Self> {
		match label {
			"public" => Some(Self::Public),
			"internal" => Some(Self::Internal),
			_ => None,
		}
	}
}
impl std::fmt::Display for Sensitivity {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
