use std::sync::LazyLock;

use regex::Regex;

use crate::{identifiers::contains_identifier, source::SourceType};

static QUOTE_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(>|\|)").unwrap());
static REPLY_HEADER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)^(On .{1,120} wrote:|-{2,}\s*Original Message\s*-{2,}|From:\s.+)$").unwrap()
});
static SIGNATURE_START: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)^(--\s*|best regards,?|kind regards,?|regards,?|sincerely,?|thanks,?|thank you,?|cheers,?)$")
		.unwrap()
});
static LEGAL_FOOTER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)(confidential|intended recipient|privileged|this e?-?mail and any attachments|do not distribute|legally binding)")
		.unwrap()
});
static AUTO_REPLY: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)(out of (the )?office|automatic reply|auto-?reply|i am currently away|will respond (to your message )?upon my return|limited access to email)")
		.unwrap()
});

/// Strips quoted-reply chains, signatures, legal footers, and auto-reply
/// boilerplate from conversational bodies. Lines carrying an order, tracking,
/// PO, invoice, or SKU identifier are always kept, whatever block they sit in.
pub fn clean(source_type: SourceType, raw: &str) -> String {
	if !source_type.is_conversational() {
		return collapse_blank_lines(raw);
	}

	let mut kept = Vec::new();
	let mut in_quoted_block = false;
	let mut in_signature = false;

	for line in raw.lines() {
		let trimmed = line.trim_end();

		if contains_identifier(trimmed) {
			kept.push(strip_quote_prefix(trimmed));
			continue;
		}
		if REPLY_HEADER.is_match(trimmed.trim_start()) {
			in_quoted_block = true;
			continue;
		}
		if QUOTE_PREFIX.is_match(trimmed) {
			continue;
		}
		if in_quoted_block {
			// Everything after a reply header belongs to the quoted chain.
			continue;
		}
		if SIGNATURE_START.is_match(trimmed.trim()) {
			in_signature = true;
			continue;
		}
		if in_signature && !trimmed.trim().is_empty() {
			continue;
		}
		if in_signature {
			// A blank line does not end a signature block; trailing content
			// after a sign-off is address/phone lines.
			continue;
		}
		if LEGAL_FOOTER.is_match(trimmed) || AUTO_REPLY.is_match(trimmed) {
			continue;
		}

		kept.push(trimmed.to_string());
	}

	let cleaned = collapse_blank_lines(&kept.join("\n"));

	if cleaned.is_empty() {
		// Aggressive stripping must not erase real content; fall back to the
		// whitespace-normalized original.
		return collapse_blank_lines(raw);
	}

	cleaned
}

fn strip_quote_prefix(line: &str) -> String {
	let mut out = line;

	while let Some(found) = QUOTE_PREFIX.find(out) {
		out = &out[found.end()..];
	}

	out.trim().to_string()
}

fn collapse_blank_lines(text: &str) -> String {
	let mut out = Vec::new();
	let mut previous_blank = false;

	for line in text.lines() {
		let blank = line.trim().is_empty();

		if blank && previous_blank {
			continue;
		}

		out.push(line.trim_end().to_string());

		previous_blank = blank;
	}

	out.join("\n").trim().to_string()
}
