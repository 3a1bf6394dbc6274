use std::collections::HashMap;

use qdrant_client::qdrant::{Query, QueryPointsBuilder, point_id::PointIdOptions};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use sift_config::Ranking;
use sift_domain::{
	scope::{CandidateRow, ViewerScope, can_view},
	source::Sensitivity,
};
use sift_storage::{models::CandidateChunk, qdrant::DENSE_VECTOR_NAME, queries};

use crate::{Error, Result, SiftService, query::QueryFilters};

const SNIPPET_MAX_CHARS: usize = 500;

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct ScoreBreakdown {
	pub fts_rank: Option<f32>,
	pub vector_score: Option<f32>,
	pub fusion_score: Option<f32>,
	pub recency_boost: Option<f32>,
	pub rerank_score: Option<f32>,
	pub final_score: Option<f32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RagResultItem {
	pub source_id: Uuid,
	pub source_type: String,
	pub source_uri: Option<String>,
	pub title: String,
	pub snippet: String,
	pub chunk_id: Uuid,
	pub chunk_index: i32,
	pub customer_id: Option<i64>,
	pub ticket_id: Option<i64>,
	pub sensitivity: String,
	pub metadata: Value,
	#[serde(with = "crate::time_serde::rfc3339_option")]
	pub source_updated_at: Option<OffsetDateTime>,
	pub score: ScoreBreakdown,
}

pub(crate) struct SearchArgs<'a> {
	pub query_text: &'a str,
	pub scope: &'a ViewerScope,
	pub customer_id: Option<i64>,
	pub filters: Option<&'a QueryFilters>,
	pub top_k: usize,
	/// Set by the similar-* paths so the probe ticket never matches itself.
	pub exclude_ticket_id: Option<i64>,
}

#[derive(Debug, Default)]
pub(crate) struct SearchOutcome {
	pub items: Vec<RagResultItem>,
	pub lexical_candidates: usize,
	pub vector_candidates: usize,
	pub merged_candidates: usize,
	pub visible_candidates: usize,
}

struct Candidate {
	row: CandidateChunk,
	vector_score: Option<f32>,
}

impl SiftService {
	/// Hybrid retrieval: Postgres FTS and Qdrant cosine candidates, merged and
	/// deduplicated by chunk, access-filtered before any scoring, then ranked
	/// by the configured fusion blend.
	pub(crate) async fn search(&self, args: SearchArgs<'_>) -> Result<SearchOutcome> {
		let candidate_k = (self.cfg.search.candidate_k as usize).max(args.top_k);
		let embedded = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &[args.query_text.to_string()])
			.await?;
		let Some(query_vector) = embedded.into_iter().next() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};
		let vector_hits = self.vector_candidates(query_vector, candidate_k).await?;
		let lexical =
			queries::lexical_search(&self.db, args.query_text, args.customer_id, candidate_k as i64)
				.await?;
		let outcome = self
			.assemble(
				lexical,
				vector_hits,
				&args,
				OffsetDateTime::now_utc(),
				true,
			)
			.await?;

		Ok(outcome)
	}

	/// Nearest-neighbor chunk ids with cosine scores for one query vector.
	pub(crate) async fn vector_candidates(
		&self,
		vector: Vec<f32>,
		candidate_k: usize,
	) -> Result<HashMap<Uuid, f32>> {
		let search = QueryPointsBuilder::new(self.qdrant.collection.clone())
			.query(Query::new_nearest(vector))
			.using(DENSE_VECTOR_NAME)
			.limit(candidate_k as u64);
		let response = self.qdrant.client.query(search).await?;
		let mut hits = HashMap::new();

		for point in response.result {
			let Some(point_id) = point.id.and_then(|id| id.point_id_options) else {
				continue;
			};
			let PointIdOptions::Uuid(raw) = point_id else {
				continue;
			};
			let Ok(chunk_id) = Uuid::parse_str(&raw) else {
				continue;
			};

			hits.insert(chunk_id, point.score);
		}

		Ok(hits)
	}

	/// Merges both candidate paths, applies access control and filters, scores,
	/// and sorts. Shared by the query path and the similar-* paths (which skip
	/// the lexical side and rerank).
	pub(crate) async fn assemble(
		&self,
		lexical: Vec<CandidateChunk>,
		vector_hits: HashMap<Uuid, f32>,
		args: &SearchArgs<'_>,
		now: OffsetDateTime,
		rerank_allowed: bool,
	) -> Result<SearchOutcome> {
		let lexical_candidates = lexical.len();
		let vector_candidates = vector_hits.len();
		let mut by_chunk: HashMap<Uuid, Candidate> = HashMap::new();

		for row in lexical {
			let vector_score = vector_hits.get(&row.chunk_id).copied();

			by_chunk.insert(row.chunk_id, Candidate { row, vector_score });
		}

		let missing = vector_hits
			.keys()
			.filter(|chunk_id| !by_chunk.contains_key(chunk_id))
			.copied()
			.collect::<Vec<_>>();

		for row in queries::candidates_by_chunk_ids(&self.db, &missing).await? {
			let vector_score = vector_hits.get(&row.chunk_id).copied();

			by_chunk.insert(row.chunk_id, Candidate { row, vector_score });
		}

		let merged_candidates = by_chunk.len();
		let visible = by_chunk
			.into_values()
			.filter(|candidate| self.candidate_visible(candidate, args))
			.collect::<Vec<_>>();
		let visible_candidates = visible.len();
		let max_fts = visible
			.iter()
			.filter_map(|candidate| candidate.row.fts_rank)
			.fold(0.0_f32, f32::max);
		let ranking = &self.cfg.ranking;
		let mut items = visible
			.into_iter()
			.map(|candidate| {
				let fts_norm = candidate
					.row
					.fts_rank
					.map(|rank| if max_fts > 0.0 { rank / max_fts } else { 0.0 });
				let recency = recency_boost(candidate.row.source_updated_at, now, ranking.recency_tau_days);
				let mut score = ScoreBreakdown {
					fts_rank: fts_norm,
					vector_score: candidate.vector_score,
					recency_boost: Some(recency),
					..Default::default()
				};
				let fusion = fuse(ranking, &score);

				score.fusion_score = Some(fusion);
				score.final_score = Some(fusion);

				item_from(candidate.row, score)
			})
			.collect::<Vec<_>>();

		if rerank_allowed && ranking.rerank_enabled && !items.is_empty() {
			self.apply_rerank(args.query_text, &mut items).await?;
		}

		order_results(&mut items);
		items.truncate(args.top_k);

		Ok(SearchOutcome {
			items,
			lexical_candidates,
			vector_candidates,
			merged_candidates,
			visible_candidates,
		})
	}

	async fn apply_rerank(&self, query_text: &str, items: &mut [RagResultItem]) -> Result<()> {
		let docs = items.iter().map(|item| item.snippet.clone()).collect::<Vec<_>>();
		let scores =
			self.providers.rerank.rerank(&self.cfg.providers.rerank, query_text, &docs).await?;

		for (item, rerank_score) in items.iter_mut().zip(scores) {
			let fusion = item.score.fusion_score.unwrap_or(0.0);

			item.score.rerank_score = Some(rerank_score);
			item.score.final_score =
				Some(fusion + self.cfg.ranking.rerank_weight * rerank_score);
		}

		Ok(())
	}

	/// Row-level access and request filters. An unparseable sensitivity label
	/// denies the row.
	fn candidate_visible(&self, candidate: &Candidate, args: &SearchArgs<'_>) -> bool {
		let row = &candidate.row;
		let Some(sensitivity) = Sensitivity::parse(&row.sensitivity) else {
			return false;
		};

		if !can_view(args.scope, &CandidateRow {
			customer_id: row.customer_id,
			sensitivity,
			department: row.department.as_deref(),
		}) {
			return false;
		}

		if let Some(excluded) = args.exclude_ticket_id
			&& row.ticket_id == Some(excluded)
		{
			return false;
		}

		if let Some(context_customer) = args.customer_id
			&& let Some(customer_id) = row.customer_id
			&& customer_id != context_customer
		{
			return false;
		}

		let Some(filters) = args.filters else {
			return true;
		};

		if let Some(source_types) = &filters.source_type_in
			&& !source_types.iter().any(|label| label == &row.source_type)
		{
			return false;
		}
		if filters.include_internal == Some(false) && sensitivity == Sensitivity::Internal {
			return false;
		}
		if let Some(departments) = &filters.departments
			&& let Some(department) = &row.department
			&& !departments.iter().any(|label| label == department)
		{
			return false;
		}
		created_in_range(row.source_created_at, filters.created_after, filters.created_before)
	}
}

/// Creation-time bounds from the request. Undated sources fail any bound
/// because the claim cannot be verified.
pub(crate) fn created_in_range(
	created_at: Option<OffsetDateTime>,
	after: Option<OffsetDateTime>,
	before: Option<OffsetDateTime>,
) -> bool {
	if let Some(after) = after
		&& created_at.map(|ts| ts < after).unwrap_or(true)
	{
		return false;
	}
	if let Some(before) = before
		&& created_at.map(|ts| ts > before).unwrap_or(true)
	{
		return false;
	}

	true
}

pub(crate) fn item_from(row: CandidateChunk, score: ScoreBreakdown) -> RagResultItem {
	let snippet = snippet_of(&row.chunk_text);

	RagResultItem {
		source_id: row.source_id,
		source_type: row.source_type,
		source_uri: row.source_uri,
		title: row.title,
		snippet,
		chunk_id: row.chunk_id,
		chunk_index: row.chunk_index,
		customer_id: row.customer_id,
		ticket_id: row.ticket_id,
		sensitivity: row.sensitivity,
		metadata: row.metadata,
		source_updated_at: row.source_updated_at,
		score,
	}
}

fn snippet_of(text: &str) -> String {
	if text.chars().count() <= SNIPPET_MAX_CHARS {
		return text.to_string();
	}

	let mut out = text.chars().take(SNIPPET_MAX_CHARS).collect::<String>();

	out.push_str("...");

	out
}

/// Exponential decay on source age; 1.0 for brand-new sources, falling toward
/// zero as age grows past tau. Undated sources get no boost.
pub(crate) fn recency_boost(
	updated_at: Option<OffsetDateTime>,
	now: OffsetDateTime,
	tau_days: f32,
) -> f32 {
	let Some(updated_at) = updated_at else {
		return 0.0;
	};

	if tau_days <= 0.0 {
		return 0.0;
	}

	let age_days = ((now - updated_at).whole_seconds().max(0) as f32) / 86_400.0;

	(-age_days / tau_days).exp()
}

pub(crate) fn fuse(ranking: &Ranking, score: &ScoreBreakdown) -> f32 {
	ranking.lexical_weight * score.fts_rank.unwrap_or(0.0)
		+ ranking.vector_weight * score.vector_score.unwrap_or(0.0)
		+ ranking.recency_weight * score.recency_boost.unwrap_or(0.0)
}

/// Descending final score; equal scores break toward the fresher source.
pub(crate) fn order_results(items: &mut [RagResultItem]) {
	items.sort_by(|a, b| {
		let a_score = a.score.final_score.unwrap_or(0.0);
		let b_score = b.score.final_score.unwrap_or(0.0);

		b_score
			.partial_cmp(&a_score)
			.unwrap_or(std::cmp::Ordering::Equal)
			.then_with(|| b.source_updated_at.cmp(&a.source_updated_at))
	});
}
