use std::collections::HashMap;

use serde::Deserialize;
use time::OffsetDateTime;

use sift_domain::scope::ViewerScope;
use sift_storage::sources;

use crate::{
	Error, Result, SiftService, embedding_version, mean_pool,
	query::QueryFilters,
	search::{RagResultItem, SearchArgs},
};

#[derive(Clone, Debug, Deserialize)]
pub struct SimilarRequest {
	pub ticket_id: i64,
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default)]
	pub include_internal: Option<bool>,
}

impl SiftService {
	/// Tickets whose indexed content sits closest to the probe ticket's
	/// mean-pooled vector. Used for duplicate detection.
	pub async fn find_similar_tickets(
		&self,
		scope: &ViewerScope,
		request: &SimilarRequest,
	) -> Result<Vec<RagResultItem>> {
		self.find_similar(scope, request, None).await
	}

	/// Same probe, but the candidate set narrows to outbound conversational
	/// sources, for reply suggestion.
	pub async fn find_similar_replies(
		&self,
		scope: &ViewerScope,
		request: &SimilarRequest,
	) -> Result<Vec<RagResultItem>> {
		self.find_similar(
			scope,
			request,
			Some(vec!["ticket_comment".to_string(), "email".to_string()]),
		)
		.await
	}

	async fn find_similar(
		&self,
		scope: &ViewerScope,
		request: &SimilarRequest,
		source_type_in: Option<Vec<String>>,
	) -> Result<Vec<RagResultItem>> {
		let top_k = self.clamp_similar_top_k(request.top_k)?;
		let ticket_sources = sources::sources_for_ticket(&self.db, request.ticket_id).await?;

		if ticket_sources.is_empty() {
			return Err(Error::NotFound {
				message: format!("No indexed sources for ticket {}.", request.ticket_id),
			});
		}

		let customer_id = ticket_sources.iter().find_map(|source| source.customer_id);
		let Some(probe) = self.ticket_vector(&ticket_sources).await? else {
			// Indexed but not yet embedded; nothing to compare against.
			return Ok(Vec::new());
		};
		let candidate_k = (self.cfg.search.candidate_k as usize).max(top_k);
		let vector_hits = self.vector_candidates(probe, candidate_k).await?;
		let filters = QueryFilters {
			source_type_in,
			include_internal: request.include_internal,
			..Default::default()
		};
		let args = SearchArgs {
			query_text: "",
			scope,
			customer_id,
			filters: Some(&filters),
			top_k,
			exclude_ticket_id: Some(request.ticket_id),
		};
		let outcome =
			self.assemble(Vec::new(), vector_hits, &args, OffsetDateTime::now_utc(), false).await?;

		Ok(outcome.items)
	}

	/// Mean-pools every cached chunk vector across the ticket's sources.
	async fn ticket_vector(
		&self,
		ticket_sources: &[sift_storage::models::SourceRecord],
	) -> Result<Option<Vec<f32>>> {
		let version = embedding_version(&self.cfg);
		let mut hashes = Vec::new();

		for source in ticket_sources {
			for chunk in sources::chunks_for_source(&self.db, source.source_id).await? {
				hashes.push(chunk.chunk_hash);
			}
		}

		let cached: HashMap<String, Vec<f32>> =
			sources::cached_embeddings(&self.db, &hashes, &version).await?;
		let vectors = cached.into_values().collect::<Vec<_>>();

		Ok(mean_pool(&vectors))
	}

	fn clamp_similar_top_k(&self, requested: Option<u32>) -> Result<usize> {
		let max = self.cfg.search.similar_max_top_k;
		let top_k = requested.unwrap_or(self.cfg.search.default_top_k.min(max));

		if top_k == 0 || top_k > max {
			return Err(Error::InvalidRequest {
				message: format!("top_k must be between 1 and {max}."),
			});
		}

		Ok(top_k as usize)
	}
}
