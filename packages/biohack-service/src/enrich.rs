//! Background enrichers that turn a finished taxonomy into narrative summary lists.

use std::fmt::Write as _;

use biohack_domain::{Biohack, Summary, Taxonomy};

use crate::{
	BiohackService,
	chain::{Chain, ModelChain, Prediction},
	schema::{self, ItemList, OutputSchema, SchemaTemplate},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
	Balance,
	Skeptical,
	Curious,
}
impl SummaryKind {
	pub const ALL: [Self; 3] = [Self::Balance, Self::Skeptical, Self::Curious];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Balance => "balance",
			Self::Skeptical => "skeptical",
			Self::Curious => "curious",
		}
	}

	fn template(self) -> SchemaTemplate {
		match self {
			Self::Balance => schema::BALANCE,
			Self::Skeptical => schema::SKEPTICAL,
			Self::Curious => schema::CURIOUS,
		}
	}
}

/// One narrative list over the whole taxonomy.
pub struct SummaryChain {
	kind: SummaryKind,
	question: String,
	schema: OutputSchema,
}
impl SummaryChain {
	pub fn new(kind: SummaryKind, question: &str) -> Self {
		Self { kind, question: question.to_string(), schema: kind.template().render(question) }
	}
}
impl Chain for SummaryChain {
	type Input = Taxonomy;
	type Output = ItemList;

	fn name(&self) -> &'static str {
		self.kind.as_str()
	}

	fn schema(&self) -> &OutputSchema {
		&self.schema
	}

	fn render(&self, taxonomy: &Taxonomy) -> String {
		let mut prompt = question_header(&self.question);

		for biohack in taxonomy.biohacks() {
			push_biohack_header(&mut prompt, biohack);

			for record in &biohack.records {
				let _ = writeln!(prompt, "- {}", record.outcome);
			}
		}

		prompt.push('\n');
		prompt.push_str(schema::style_rules());

		prompt
	}
}

/// Causal pathways behind one biohack's outcomes.
pub struct MechanismChain {
	question: String,
	schema: OutputSchema,
}
impl MechanismChain {
	pub fn new(question: &str) -> Self {
		Self { question: question.to_string(), schema: schema::MECHANISMS.render(question) }
	}
}
impl Chain for MechanismChain {
	type Input = Biohack;
	type Output = ItemList;

	fn name(&self) -> &'static str {
		"mechanisms"
	}

	fn schema(&self) -> &OutputSchema {
		&self.schema
	}

	fn render(&self, biohack: &Biohack) -> String {
		let mut prompt = question_header(&self.question);

		push_biohack_header(&mut prompt, biohack);

		for record in &biohack.records {
			let mechanism = record.mechanism.as_deref().unwrap_or("unknown");
			let _ = writeln!(prompt, "- Mechanisms: {mechanism} --> Outcomes: {}", record.outcome);
		}

		prompt.push('\n');
		prompt.push_str(schema::style_rules());

		prompt
	}
}

impl BiohackService {
	/// Runs every enricher concurrently. A failed enricher contributes an empty list.
	pub async fn summarize(&self, question: &str, taxonomy: &Taxonomy) -> Summary {
		let summary_opts = self.call_options(&self.cfg.chains.summary);
		let mechanism_opts = self.call_options(&self.cfg.chains.mechanisms);
		let [balance, skeptical, curious] = SummaryKind::ALL
			.map(|kind| ModelChain::new(SummaryChain::new(kind, question), self.runtime().clone()));
		let mechanisms = ModelChain::new(MechanismChain::new(question), self.runtime().clone());
		let biohacks: Vec<Biohack> = taxonomy.biohacks().cloned().collect();
		let (balance, skeptical, curious, mechanisms) = tokio::join!(
			balance.predict(taxonomy, &summary_opts),
			skeptical.predict(taxonomy, &summary_opts),
			curious.predict(taxonomy, &summary_opts),
			mechanisms.batch_predict(&biohacks, &mechanism_opts),
		);

		Summary {
			balance: items_or_empty(balance),
			skeptical: items_or_empty(skeptical),
			curious: items_or_empty(curious),
			mechanisms: mechanisms.into_iter().flat_map(items_or_empty).collect(),
		}
	}
}

fn items_or_empty(prediction: Prediction<ItemList>) -> Vec<String> {
	match prediction {
		Ok(list) => list.items.into_iter().filter(|item| !item.trim().is_empty()).collect(),
		Err(err) => {
			tracing::warn!(chain = err.chain, kind = %err.kind, "Enricher produced no items.");

			Vec::new()
		},
	}
}

fn question_header(question: &str) -> String {
	format!("User's search bar text:\n{question}\n\nBiohacking research results:\n")
}

fn push_biohack_header(prompt: &mut String, biohack: &Biohack) {
	let topic = biohack.topic.as_deref().unwrap_or("Unlabelled experience");

	let _ = writeln!(prompt, "\n=== Biohack name: {topic} ===");
}
