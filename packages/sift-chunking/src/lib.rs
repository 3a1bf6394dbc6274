use unicode_segmentation::UnicodeSegmentation;

use sift_domain::source::SourceType;

#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	/// Content at or under this length becomes exactly one chunk.
	pub single_chunk_max_chars: usize,
	/// Upper bound for one chunk's text when splitting.
	pub max_chars: usize,
}

#[derive(Clone, Debug)]
pub struct Chunk {
	pub chunk_index: i32,
	pub text: String,
}

/// Resolves the per-source-type chunk sizing from config. Short note-like
/// sources get tighter bounds than long-form email bodies.
pub fn config_for(source_type: SourceType, cfg: &sift_config::Chunking) -> ChunkingConfig {
	let max_chars = cfg
		.max_chars_overrides
		.get(source_type.as_str())
		.copied()
		.unwrap_or(cfg.default_max_chars) as usize;

	ChunkingConfig {
		single_chunk_max_chars: (cfg.single_chunk_max_chars as usize).min(max_chars),
		max_chars,
	}
}

/// Splits text into ordered chunks on sentence boundaries, packing sentences
/// greedily up to `max_chars`. Deterministic for identical input; chunk-hash
/// dedup across re-runs depends on that.
pub fn split_text(text: &str, cfg: &ChunkingConfig) -> Vec<Chunk> {
	let trimmed = text.trim();

	if trimmed.is_empty() {
		return Vec::new();
	}
	if trimmed.chars().count() <= cfg.single_chunk_max_chars {
		return vec![Chunk { chunk_index: 0, text: trimmed.to_string() }];
	}

	let mut chunks = Vec::new();
	let mut current = String::new();
	let mut chunk_index = 0_i32;

	for sentence in sentences(trimmed) {
		let sentence_len = sentence.chars().count();

		if !current.is_empty()
			&& current.chars().count() + sentence_len > cfg.max_chars
		{
			push_chunk(&mut chunks, &mut chunk_index, &mut current);
		}

		// A single sentence longer than the bound is split hard on grapheme
		// boundaries rather than dropped.
		if sentence_len > cfg.max_chars {
			for piece in hard_split(sentence, cfg.max_chars) {
				if !current.is_empty() {
					push_chunk(&mut chunks, &mut chunk_index, &mut current);
				}

				current.push_str(&piece);
				push_chunk(&mut chunks, &mut chunk_index, &mut current);
			}

			continue;
		}

		current.push_str(sentence);
	}

	if !current.trim().is_empty() {
		push_chunk(&mut chunks, &mut chunk_index, &mut current);
	}

	chunks
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
	text.split_sentence_bounds()
}

fn push_chunk(chunks: &mut Vec<Chunk>, chunk_index: &mut i32, current: &mut String) {
	let text = current.trim();

	if !text.is_empty() {
		chunks.push(Chunk { chunk_index: *chunk_index, text: text.to_string() });

		*chunk_index += 1;
	}

	current.clear();
}

fn hard_split(sentence: &str, max_chars: usize) -> Vec<String> {
	let mut out = Vec::new();
	let mut piece = String::new();
	let mut count = 0_usize;

	for grapheme in sentence.graphemes(true) {
		if count >= max_chars {
			out.push(std::mem::take(&mut piece));

			count = 0;
		}

		piece.push_str(grapheme);

		count += 1;
	}

	if !piece.is_empty() {
		out.push(piece);
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cfg(single: usize, max: usize) -> ChunkingConfig {
		ChunkingConfig { single_chunk_max_chars: single, max_chars: max }
	}

	fn long_body(words: usize) -> String {
		(0..words)
			.map(|idx| {
				if idx % 12 == 11 { format!("word{idx}. ") } else { format!("word{idx} ") }
			})
			.collect()
	}

	#[test]
	fn short_note_is_a_single_chunk() {
		let text = "Customer called about a late delivery, promised an update tomorrow.";
		let chunks = split_text(text, &cfg(800, 1_600));

		assert_eq!(chunks.len(), 1);
		assert_eq!(chunks[0].chunk_index, 0);
		assert_eq!(chunks[0].text, text);
	}

	#[test]
	fn long_ticket_body_yields_multiple_chunks() {
		let text = long_body(1_200);
		let chunks = split_text(&text, &cfg(800, 1_600));

		assert!(chunks.len() > 1, "expected multiple chunks, got {}", chunks.len());

		for (idx, chunk) in chunks.iter().enumerate() {
			assert_eq!(chunk.chunk_index, idx as i32);
			assert!(!chunk.text.is_empty());
		}
	}

	#[test]
	fn chunking_is_deterministic() {
		let text = long_body(900);
		let first = split_text(&text, &cfg(800, 1_600));
		let second = split_text(&text, &cfg(800, 1_600));

		assert_eq!(first.len(), second.len());

		for (a, b) in first.iter().zip(second.iter()) {
			assert_eq!(a.chunk_index, b.chunk_index);
			assert_eq!(a.text, b.text);
		}
	}

	#[test]
	fn oversized_sentence_is_hard_split() {
		let text = "x".repeat(5_000);
		let chunks = split_text(&text, &cfg(100, 1_000));

		assert!(chunks.len() >= 5);
		assert!(chunks.iter().all(|chunk| chunk.text.chars().count() <= 1_000));
	}

	#[test]
	fn empty_input_yields_no_chunks() {
		assert!(split_text("   \n  ", &cfg(800, 1_600)).is_empty());
	}

	#[test]
	fn override_shrinks_the_bound_for_a_source_type() {
		let mut chunking = sift_config::Chunking {
			single_chunk_max_chars: 800,
			default_max_chars: 1_600,
			max_chars_overrides: Default::default(),
		};

		chunking.max_chars_overrides.insert("email".to_string(), 1_200);

		let email = config_for(sift_domain::source::SourceType::Email, &chunking);
		let ticket = config_for(sift_domain::source::SourceType::Ticket, &chunking);

		assert_eq!(email.max_chars, 1_200);
		assert_eq!(ticket.max_chars, 1_600);
	}
}
