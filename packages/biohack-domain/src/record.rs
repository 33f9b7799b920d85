use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const OTHER_CATEGORY: &str = "other";

static DOI: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?:^|/)10\.\d{4,9}/\S+").expect("DOI pattern must compile.")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
	Reddit,
	Study,
}

/// Minimum quality a record must reach before it is grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityThreshold {
	pub min_action_score: i64,
	pub min_outcomes_score: i64,
}

/// One action to outcome data point. Field names follow the search index, so index hits
/// deserialize directly and any extra index fields are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
	pub permalink: String,
	pub action: String,
	#[serde(rename = "outcomes")]
	pub outcome: String,
	#[serde(default)]
	pub health_disorder: Option<String>,
	#[serde(default)]
	pub mechanism: Option<String>,
	#[serde(default)]
	pub personal_context: Option<String>,
	#[serde(default, alias = "biohack_topic")]
	pub topic: Option<String>,
	#[serde(default, alias = "biohack_type")]
	pub category: Option<String>,
	#[serde(default)]
	pub action_score: Option<i64>,
	#[serde(default)]
	pub outcomes_score: Option<i64>,
}
impl Record {
	pub fn source_type(&self) -> SourceType {
		if DOI.is_match(&self.permalink) { SourceType::Study } else { SourceType::Reddit }
	}

	pub fn url(&self) -> String {
		match self.source_type() {
			SourceType::Study => format!("https://doi.org/{}", self.permalink),
			SourceType::Reddit => format!("https://www.reddit.com{}", self.permalink),
		}
	}

	pub fn fingerprint(&self) -> String {
		format!("{} {}", self.action, self.outcome)
	}

	pub fn is_valid(&self, threshold: &QualityThreshold) -> bool {
		let Some(category) = self.category.as_deref() else {
			return false;
		};

		if category == OTHER_CATEGORY {
			return false;
		}

		match (self.action_score, self.outcomes_score) {
			(Some(action), Some(outcomes)) =>
				action >= threshold.min_action_score && outcomes >= threshold.min_outcomes_score,
			_ => false,
		}
	}
}

pub fn retain_valid(records: Vec<Record>, threshold: &QualityThreshold) -> Vec<Record> {
	records.into_iter().filter(|record| record.is_valid(threshold)).collect()
}
