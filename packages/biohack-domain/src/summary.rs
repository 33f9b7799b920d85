use serde::{Deserialize, Serialize};

/// Narrative enrichment produced for one taxonomy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
	pub balance: Vec<String>,
	pub skeptical: Vec<String>,
	pub curious: Vec<String>,
	pub mechanisms: Vec<String>,
}
impl Summary {
	pub fn item_count(&self) -> usize {
		self.balance.len() + self.skeptical.len() + self.curious.len() + self.mechanisms.len()
	}

	/// A summary missing any of its narrative lists carries no value for the client and
	/// should be retried. Mechanisms are optional.
	pub fn is_vacuous(&self) -> bool {
		self.balance.is_empty() || self.skeptical.is_empty() || self.curious.is_empty()
	}
}
