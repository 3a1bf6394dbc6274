mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Chunking, Config, EmbeddingProviderConfig, Ingestion, Limits, Postgres, ProviderConfig,
	Providers, Qdrant, Ranking, Search, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.admin_bind must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.api_key must be non-empty.".to_string(),
		});
	}
	if cfg.ranking.rerank_enabled && cfg.providers.rerank.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.rerank.api_key must be non-empty when rerank is enabled."
				.to_string(),
		});
	}
	if cfg.chunking.single_chunk_max_chars == 0 {
		return Err(Error::Validation {
			message: "chunking.single_chunk_max_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.default_max_chars < cfg.chunking.single_chunk_max_chars {
		return Err(Error::Validation {
			message:
				"chunking.default_max_chars must be at least chunking.single_chunk_max_chars."
					.to_string(),
		});
	}

	for (source_type, max_chars) in &cfg.chunking.max_chars_overrides {
		if *max_chars == 0 {
			return Err(Error::Validation {
				message: format!(
					"chunking.max_chars_overrides.{source_type} must be greater than zero."
				),
			});
		}
	}

	if cfg.search.candidate_k == 0 {
		return Err(Error::Validation {
			message: "search.candidate_k must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_top_k == 0 || cfg.search.default_top_k > cfg.search.max_top_k {
		return Err(Error::Validation {
			message: "search.default_top_k must be in the range 1..=search.max_top_k.".to_string(),
		});
	}
	if cfg.search.max_top_k > 50 {
		return Err(Error::Validation {
			message: "search.max_top_k must be 50 or less.".to_string(),
		});
	}
	if cfg.search.similar_max_top_k == 0 || cfg.search.similar_max_top_k > 20 {
		return Err(Error::Validation {
			message: "search.similar_max_top_k must be in the range 1..=20.".to_string(),
		});
	}

	for (label, weight) in [
		("lexical_weight", cfg.ranking.lexical_weight),
		("vector_weight", cfg.ranking.vector_weight),
		("recency_weight", cfg.ranking.recency_weight),
		("recency_tau_days", cfg.ranking.recency_tau_days),
		("rerank_weight", cfg.ranking.rerank_weight),
		("high_confidence_threshold", cfg.ranking.high_confidence_threshold),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation {
				message: format!("ranking.{label} must be a finite number."),
			});
		}
		if weight < 0.0 {
			return Err(Error::Validation {
				message: format!("ranking.{label} must be zero or greater."),
			});
		}
	}

	if cfg.ranking.lexical_weight == 0.0 && cfg.ranking.vector_weight == 0.0 {
		return Err(Error::Validation {
			message: "ranking.lexical_weight and ranking.vector_weight must not both be zero."
				.to_string(),
		});
	}
	if cfg.ingestion.batch_limit == 0 {
		return Err(Error::Validation {
			message: "ingestion.batch_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.ingestion.base_backoff_ms <= 0 {
		return Err(Error::Validation {
			message: "ingestion.base_backoff_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.ingestion.cap_attempts <= 0 {
		return Err(Error::Validation {
			message: "ingestion.cap_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.ingestion.max_attempts <= 0 {
		return Err(Error::Validation {
			message: "ingestion.max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.ingestion.lease_seconds <= 0 {
		return Err(Error::Validation {
			message: "ingestion.lease_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.limits.per_user_per_minute == 0 || cfg.limits.per_origin_per_minute == 0 {
		return Err(Error::Validation {
			message: "limits.per_user_per_minute and limits.per_origin_per_minute must be greater than zero."
				.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
