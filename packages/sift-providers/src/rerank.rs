use std::time::Duration;

use color_eyre::{Result, eyre::eyre};
use reqwest::Client;
use serde::Deserialize;

pub async fn rerank(
	cfg: &sift_config::ProviderConfig,
	query: &str,
	docs: &[String],
) -> Result<Vec<f32>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let body = serde_json::json!({
		"model": cfg.model,
		"query": query,
		"documents": docs,
		"top_n": docs.len(),
	});
	let response: RerankResponse = client
		.post(format!("{}{}", cfg.api_base, cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?
		.error_for_status()?
		.json()
		.await?;

	score_slots(response, docs.len())
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
	#[serde(alias = "data")]
	results: Vec<RerankItem>,
}

#[derive(Debug, Deserialize)]
struct RerankItem {
	index: usize,
	#[serde(alias = "score")]
	relevance_score: f32,
}

/// Rerankers score the documents they judged, keyed back to the request by
/// `index`. Unjudged documents keep a zero score.
fn score_slots(response: RerankResponse, doc_count: usize) -> Result<Vec<f32>> {
	let mut scores = vec![0.0_f32; doc_count];

	for item in response.results {
		let slot = scores
			.get_mut(item.index)
			.ok_or_else(|| eyre!("Rerank item index {} is out of range.", item.index))?;

		*slot = item.relevance_score;
	}

	Ok(scores)
}
