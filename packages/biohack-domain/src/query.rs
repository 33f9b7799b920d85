/// Canonical cache key for a user question: surrounding whitespace and one trailing `?` are
/// removed. Applied at every entry point.
pub fn normalize_query(raw: &str) -> String {
	let trimmed = raw.trim();
	let stripped = trimmed.strip_suffix('?').unwrap_or(trimmed);

	stripped.trim_end().to_string()
}
