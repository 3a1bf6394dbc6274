use std::time::Duration;

use color_eyre::{Result, eyre::eyre};
use reqwest::Client;
use serde::Deserialize;

/// One batched call for the whole input slice; vectors come back in input
/// order regardless of how the provider orders its response items.
pub async fn embed(
	cfg: &sift_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
		"encoding_format": "float",
	});
	let response: EmbeddingResponse = client
		.post(format!("{}{}", cfg.api_base, cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?
		.error_for_status()?
		.json()
		.await?;

	order_embeddings(response, texts.len())
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
	data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
	#[serde(default)]
	index: Option<usize>,
	embedding: Vec<f32>,
}

/// Places each item by its explicit `index`, falling back to response
/// position for providers that omit it. One vector per input, no gaps.
fn order_embeddings(response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
	if response.data.len() != expected {
		return Err(eyre!(
			"Embedding response carries {} items for {expected} inputs.",
			response.data.len()
		));
	}

	let mut ordered: Vec<Option<Vec<f32>>> = (0..expected).map(|_| None).collect();

	for (position, item) in response.data.into_iter().enumerate() {
		let index = item.index.unwrap_or(position);
		let slot = ordered
			.get_mut(index)
			.ok_or_else(|| eyre!("Embedding item index {index} is out of range."))?;

		if slot.replace(item.embedding).is_some() {
			return Err(eyre!("Embedding item index {index} appears twice."));
		}
	}

	// The length and duplicate checks above leave every slot filled.
	Ok(ordered.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn response(json: serde_json::Value) -> EmbeddingResponse {
		serde_json::from_value(json).expect("response shape")
	}

	#[test]
	fn orders_items_by_their_index() {
		let parsed = order_embeddings(
			response(serde_json::json!({
				"data": [
					{ "index": 1, "embedding": [2.0, 3.0] },
					{ "index": 0, "embedding": [0.5, 1.5] }
				]
			})),
			2,
		)
		.expect("ordering failed");

		assert_eq!(parsed, vec![vec![0.5, 1.5], vec![2.0, 3.0]]);
	}

	#[test]
	fn falls_back_to_response_position_without_indexes() {
		let parsed = order_embeddings(
			response(serde_json::json!({
				"data": [{ "embedding": [1.0] }, { "embedding": [2.0] }]
			})),
			2,
		)
		.expect("ordering failed");

		assert_eq!(parsed, vec![vec![1.0], vec![2.0]]);
	}

	#[test]
	fn rejects_a_short_response() {
		let short = response(serde_json::json!({
			"data": [{ "index": 0, "embedding": [1.0] }]
		}));

		assert!(order_embeddings(short, 2).is_err());
	}

	#[test]
	fn rejects_duplicate_indexes() {
		let duplicated = response(serde_json::json!({
			"data": [
				{ "index": 0, "embedding": [1.0] },
				{ "index": 0, "embedding": [2.0] }
			]
		}));

		assert!(order_embeddings(duplicated, 2).is_err());
	}
}
