use uuid::Uuid;

use biohack_domain::{QualityThreshold, Taxonomy};

use crate::{BiohackService, Result};

impl BiohackService {
	/// Retrieval, dedup, quality filter, pertinence filter and grouping for one normalized
	/// question. Nothing is cached here.
	pub async fn build_taxonomy(&self, question: &str) -> Result<Taxonomy> {
		let run_id = Uuid::new_v4();
		let retrieved = match self.retrieve(question).await {
			Ok(records) => records,
			Err(err) => {
				tracing::error!(%run_id, stage = "retrieval", error = %err, "Pipeline failed.");

				return Err(err);
			},
		};
		let retrieved_count = retrieved.len();
		let unique = biohack_domain::dedup_records(retrieved);
		let unique_count = unique.len();
		let valid = biohack_domain::retain_valid(unique, &self.quality_threshold());

		tracing::info!(
			%run_id,
			stage = "prefilter",
			retrieved = retrieved_count,
			unique = unique_count,
			valid = valid.len(),
			"Records prepared."
		);

		let pertinent = self.filter_pertinent(question, valid).await;
		let taxonomy = biohack_domain::build_taxonomy(pertinent);

		tracing::info!(
			%run_id,
			stage = "taxonomy",
			count_experiences = taxonomy.count_experiences,
			categories = taxonomy.categories.len(),
			"Taxonomy built."
		);

		Ok(taxonomy)
	}

	pub fn quality_threshold(&self) -> QualityThreshold {
		QualityThreshold {
			min_action_score: self.cfg.retrieval.min_action_score,
			min_outcomes_score: self.cfg.retrieval.min_outcomes_score,
		}
	}
}
