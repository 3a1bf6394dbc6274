use serde::{Deserialize, Serialize};

use crate::identifiers::ExtractedIdentifiers;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
	IdentifierLookup,
	AccountHistory,
	PolicySop,
	LogisticsShipping,
	PaymentsTerms,
	Troubleshooting,
}
impl QueryIntent {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::IdentifierLookup => "identifier_lookup",
			Self::AccountHistory => "account_history",
			Self::PolicySop => "policy_sop",
			Self::LogisticsShipping => "logistics_shipping",
			Self::PaymentsTerms => "payments_terms",
			Self::Troubleshooting => "troubleshooting",
		}
	}
}
impl std::fmt::Display for QueryIntent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

const POLICY_TERMS: &[&str] =
	&["policy", "sop", "procedure", "warranty", "return window", "restocking", "how do we"];
const LOGISTICS_TERMS: &[&str] = &[
	"ship",
	"shipping",
	"shipment",
	"freight",
	"carrier",
	"hazmat",
	"pallet",
	"delivery",
	"tracking",
	"customs",
	"ltl",
];
const PAYMENTS_TERMS: &[&str] = &[
	"payment",
	"terms",
	"net 30",
	"net 60",
	"credit",
	"billing",
	"balance",
	"refund",
	"invoice",
	"past due",
];
const TROUBLESHOOTING_TERMS: &[&str] =
	&["error", "not working", "broken", "defective", "troubleshoot", "malfunction", "leaking", "fix"];

/// Pure classification; identifier presence always wins regardless of phrasing.
pub fn classify_intent(text: &str, identifiers: &ExtractedIdentifiers) -> QueryIntent {
	if !identifiers.is_empty() {
		return QueryIntent::IdentifierLookup;
	}

	let lowered = text.to_lowercase();

	if matches_any(&lowered, POLICY_TERMS) {
		return QueryIntent::PolicySop;
	}
	if matches_any(&lowered, LOGISTICS_TERMS) {
		return QueryIntent::LogisticsShipping;
	}
	if matches_any(&lowered, PAYMENTS_TERMS) {
		return QueryIntent::PaymentsTerms;
	}
	if matches_any(&lowered, TROUBLESHOOTING_TERMS) {
		return QueryIntent::Troubleshooting;
	}

	QueryIntent::AccountHistory
}

fn matches_any(lowered: &str, terms: &[&str]) -> bool {
	terms.iter().any(|term| lowered.contains(term))
}
