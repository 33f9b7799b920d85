use biohack_domain::Record;

use crate::{
	BiohackService,
	chain::{Chain, ModelChain, Prediction},
	schema::{self, OutputSchema, Verdict},
};

/// Asks whether one record is a concrete treatment outcome for the question.
pub struct PertinenceChain {
	schema: OutputSchema,
}
impl PertinenceChain {
	pub fn new(question: &str) -> Self {
		Self { schema: schema::PERTINENCE.render(question) }
	}
}
impl Chain for PertinenceChain {
	type Input = Record;
	type Output = Verdict;

	fn name(&self) -> &'static str {
		"pertinence"
	}

	fn schema(&self) -> &OutputSchema {
		&self.schema
	}

	fn render(&self, record: &Record) -> String {
		let mut prompt = format!("Action: {}\nOutcome: {}", record.action, record.outcome);

		if let Some(disorder) = record.health_disorder.as_deref() {
			prompt.push_str("\nHealth disorder: ");
			prompt.push_str(disorder);
		}

		prompt
	}
}

impl BiohackService {
	/// Keeps the records the model confirmed as pertinent. Failed verdicts count as rejections.
	pub async fn filter_pertinent(&self, question: &str, records: Vec<Record>) -> Vec<Record> {
		if records.is_empty() {
			return records;
		}

		let chain = ModelChain::new(PertinenceChain::new(question), self.runtime().clone());
		let opts = self.call_options(&self.cfg.chains.pertinence);
		let verdicts = chain.batch_predict(&records, &opts).await;

		retain_pertinent(records, verdicts)
	}
}

pub fn retain_pertinent(records: Vec<Record>, verdicts: Vec<Prediction<Verdict>>) -> Vec<Record> {
	let total = records.len();
	let mut failed = 0;
	let kept: Vec<Record> = records
		.into_iter()
		.zip(verdicts)
		.filter_map(|(record, verdict)| match verdict {
			Ok(Verdict { pertinent: true, .. }) => Some(record),
			Ok(_) => None,
			Err(_) => {
				failed += 1;

				None
			},
		})
		.collect();

	tracing::info!(stage = "pertinence", total, kept = kept.len(), failed, "Filtered records.");

	kept
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::chain::{ChainError, ChainErrorKind};

	fn record(permalink: &str) -> Record {
		serde_json::from_value(serde_json::json!({
			"permalink": permalink,
			"action": "cold shower",
			"outcomes": "more alert",
		}))
		.expect("Record fixture must decode.")
	}

	#[test]
	fn drops_rejected_and_failed_records() {
		let records = vec![record("/a"), record("/b"), record("/c")];
		let verdicts = vec![
			Ok(Verdict { pertinent: true, rationale: None }),
			Err(ChainError::new(ChainErrorKind::Connectivity, "pertinence", "timed out")),
			Ok(Verdict { pertinent: false, rationale: Some("Unrelated.".to_string()) }),
		];
		let kept = retain_pertinent(records, verdicts);

		assert_eq!(kept.len(), 1);
		assert_eq!(kept[0].permalink, "/a");
	}

	#[test]
	fn renders_action_and_outcome() {
		let prompt = PertinenceChain::new("energy").render(&record("/a"));

		assert!(prompt.contains("Action: cold shower"));
		assert!(prompt.contains("Outcome: more alert"));
	}
}
