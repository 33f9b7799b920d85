use serde_json::Value;

use biohack_domain::Record;

use crate::{BiohackService, Error, Result};

impl BiohackService {
	/// Fetches up to `retrieval.limit` records for a normalized question, most relevant first.
	pub async fn retrieve(&self, question: &str) -> Result<Vec<Record>> {
		let cfg = &self.cfg.providers.search;
		let hits = self
			.providers
			.retrieval
			.search(cfg, question, self.cfg.retrieval.limit)
			.await
			.map_err(|err| Error::Retrieval { message: err.to_string() })?;

		Ok(decode_hits(hits))
	}
}

/// Hits that do not carry the record fields are skipped.
pub fn decode_hits(hits: Vec<Value>) -> Vec<Record> {
	let total = hits.len();
	let records: Vec<Record> = hits
		.into_iter()
		.enumerate()
		.filter_map(|(position, hit)| match serde_json::from_value::<Record>(hit) {
			Ok(record) => Some(record),
			Err(err) => {
				tracing::warn!(position, error = %err, "Skipping malformed search hit.");

				None
			},
		})
		.collect();

	tracing::debug!(hits = total, records = records.len(), "Decoded search hits.");

	records
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn skips_hits_without_required_fields() {
		let hits = vec![
			serde_json::json!({
				"permalink": "/r/sleep/comments/a",
				"action": "magnesium",
				"outcomes": "slept longer",
				"@search.score": 4.2,
			}),
			serde_json::json!({ "permalink": "/r/sleep/comments/b" }),
		];
		let records = decode_hits(hits);

		assert_eq!(records.len(), 1);
		assert_eq!(records[0].action, "magnesium");
	}
}
