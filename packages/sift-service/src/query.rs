use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use sift_domain::{
	identifiers::{self, ExtractedIdentifiers},
	intent::{self, QueryIntent},
	scope::ViewerScope,
};
use sift_storage::sources;

use crate::{
	AccessDeniedReason, Error, Result, SiftService,
	lookup::TruthResult,
	search::{RagResultItem, SearchArgs},
};

#[derive(Clone, Debug, Deserialize)]
pub struct QueryRequest {
	pub query_text: String,
	#[serde(default)]
	pub customer_id: Option<i64>,
	#[serde(default)]
	pub ticket_id: Option<i64>,
	#[serde(default)]
	pub filters: Option<QueryFilters>,
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default)]
	pub debug: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct QueryFilters {
	#[serde(default)]
	pub source_type_in: Option<Vec<String>>,
	#[serde(default)]
	pub include_internal: Option<bool>,
	#[serde(default)]
	pub allow_global: bool,
	#[serde(default)]
	pub departments: Option<Vec<String>>,
	#[serde(default, with = "crate::time_serde::rfc3339_option")]
	pub created_after: Option<OffsetDateTime>,
	#[serde(default, with = "crate::time_serde::rfc3339_option")]
	pub created_before: Option<OffsetDateTime>,
	#[serde(default)]
	pub identifiers: Option<ExtractedIdentifiers>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
	pub intent: QueryIntent,
	pub truth_results: Vec<TruthResult>,
	pub evidence_results: Vec<RagResultItem>,
	pub confidence: Confidence,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub debug: Option<QueryDebug>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
	Low,
	Medium,
	High,
}

#[derive(Debug, Serialize)]
pub struct QueryDebug {
	pub identifiers: ExtractedIdentifiers,
	pub effective_customer_id: Option<i64>,
	pub lexical_candidates: usize,
	pub vector_candidates: usize,
	pub merged_candidates: usize,
	pub visible_candidates: usize,
}

impl SiftService {
	/// The read-path front door: context validation, intent routing,
	/// structured lookup beside hybrid retrieval, confidence derivation.
	pub async fn query_rag(
		&self,
		scope: &ViewerScope,
		request: &QueryRequest,
	) -> Result<QueryResponse> {
		let allow_global = request.filters.as_ref().map(|f| f.allow_global).unwrap_or(false);

		// Pure and first: context violations fail before any datastore call.
		validate_query_context(
			scope.is_admin(),
			request.customer_id,
			request.ticket_id,
			allow_global,
		)?;

		if request.query_text.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "query_text must not be empty.".to_string() });
		}

		let top_k = self.clamp_top_k(request.top_k)?;
		let effective_customer_id = self.resolve_customer(request).await?;
		let mut extracted = identifiers::extract_identifiers(&request.query_text);

		if let Some(overrides) = request.filters.as_ref().and_then(|f| f.identifiers.as_ref()) {
			extracted = merge_identifiers(extracted, overrides);
		}

		let intent = intent::classify_intent(&request.query_text, &extracted);
		let search_args = SearchArgs {
			query_text: &request.query_text,
			scope,
			customer_id: effective_customer_id,
			filters: request.filters.as_ref(),
			top_k,
			exclude_ticket_id: None,
		};
		let (truth_results, outcome) = if intent == QueryIntent::IdentifierLookup {
			// The fact and the narrative are fetched concurrently; neither
			// replaces the other.
			let (truth, outcome) =
				tokio::join!(self.lookup(&extracted, scope), self.search(search_args));

			(truth?, outcome?)
		} else {
			(Vec::new(), self.search(search_args).await?)
		};
		let confidence = derive_confidence(
			!truth_results.is_empty(),
			outcome.items.first().and_then(|item| item.score.final_score),
			self.cfg.ranking.high_confidence_threshold,
			!outcome.items.is_empty(),
		);
		let debug = request.debug.then(|| QueryDebug {
			identifiers: extracted,
			effective_customer_id,
			lexical_candidates: outcome.lexical_candidates,
			vector_candidates: outcome.vector_candidates,
			merged_candidates: outcome.merged_candidates,
			visible_candidates: outcome.visible_candidates,
		});

		Ok(QueryResponse {
			intent,
			truth_results,
			evidence_results: outcome.items,
			confidence,
			debug,
		})
	}

	fn clamp_top_k(&self, requested: Option<u32>) -> Result<usize> {
		let top_k = requested.unwrap_or(self.cfg.search.default_top_k);

		if top_k == 0 || top_k > self.cfg.search.max_top_k {
			return Err(Error::InvalidRequest {
				message: format!("top_k must be between 1 and {}.", self.cfg.search.max_top_k),
			});
		}

		Ok(top_k as usize)
	}

	/// The customer the query is scoped to. A supplied ticket pins the
	/// customer; a conflicting explicit customer is a context violation, not a
	/// silent empty result.
	async fn resolve_customer(&self, request: &QueryRequest) -> Result<Option<i64>> {
		let Some(ticket_id) = request.ticket_id else {
			return Ok(request.customer_id);
		};
		let ticket_customer = sources::ticket_customer(&self.db, ticket_id).await?;

		match (request.customer_id, ticket_customer) {
			(Some(requested), Some(actual)) if requested != actual =>
				Err(Error::AccessDenied { reason: AccessDeniedReason::TicketCustomerMismatch }),
			(requested, actual) => Ok(actual.or(requested)),
		}
	}
}

/// Pure context gate, run before any I/O. Non-admins must scope to a customer
/// or ticket; admins may go unscoped only with the explicit global opt-in.
pub fn validate_query_context(
	is_admin: bool,
	customer_id: Option<i64>,
	ticket_id: Option<i64>,
	allow_global: bool,
) -> Result<()> {
	if customer_id.is_some() || ticket_id.is_some() {
		return Ok(());
	}
	if !is_admin {
		return Err(Error::AccessDenied { reason: AccessDeniedReason::MissingContext });
	}
	if !allow_global {
		return Err(Error::AccessDenied { reason: AccessDeniedReason::GlobalNotAllowed });
	}

	Ok(())
}

pub(crate) fn derive_confidence(
	has_truth: bool,
	top_score: Option<f32>,
	high_threshold: f32,
	has_evidence: bool,
) -> Confidence {
	if has_truth || top_score.map(|score| score >= high_threshold).unwrap_or(false) {
		return Confidence::High;
	}
	if has_evidence {
		return Confidence::Medium;
	}

	Confidence::Low
}

fn merge_identifiers(
	mut extracted: ExtractedIdentifiers,
	overrides: &ExtractedIdentifiers,
) -> ExtractedIdentifiers {
	if overrides.order_number.is_some() {
		extracted.order_number = overrides.order_number.clone();
	}
	if overrides.invoice_number.is_some() {
		extracted.invoice_number = overrides.invoice_number.clone();
	}
	if overrides.tracking_number.is_some() {
		extracted.tracking_number = overrides.tracking_number.clone();
	}
	if overrides.sku.is_some() {
		extracted.sku = overrides.sku.clone();
	}
	if overrides.po_number.is_some() {
		extracted.po_number = overrides.po_number.clone();
	}

	extracted
}
