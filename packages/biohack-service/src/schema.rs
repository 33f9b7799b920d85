//! Output contracts for every model chain.
//!
//! Each contract is declared once as a [`SchemaTemplate`] and rendered per question, so the
//! JSON schema sent to the model and the Rust type its answer is decoded into cannot drift
//! apart.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Decoded answer of a [`Shape::Verdict`] schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Verdict {
	pub pertinent: bool,
	#[serde(default)]
	pub rationale: Option<String>,
}

/// Decoded answer of a [`Shape::ItemList`] schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemList {
	pub items: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
	Verdict,
	ItemList,
}

#[derive(Debug, Clone, Copy)]
pub struct SchemaTemplate {
	pub name: &'static str,
	pub shape: Shape,
	/// `{question}` is replaced with the normalized user question.
	pub description: &'static str,
}
impl SchemaTemplate {
	pub fn render(&self, question: &str) -> OutputSchema {
		let description = self.description.replace("{question}", question);
		let mut properties = Map::new();
		let required = match self.shape {
			Shape::Verdict => {
				properties.insert(
					"pertinent".to_string(),
					serde_json::json!({ "type": "boolean", "description": description }),
				);
				properties.insert(
					"rationale".to_string(),
					serde_json::json!({
						"type": ["string", "null"],
						"description": "One short sentence explaining the answer.",
					}),
				);

				vec!["pertinent", "rationale"]
			},
			Shape::ItemList => {
				properties.insert(
					"items".to_string(),
					serde_json::json!({
						"type": "array",
						"items": { "type": "string" },
						"description": description,
					}),
				);

				vec!["items"]
			},
		};
		let json = serde_json::json!({
			"type": "object",
			"properties": properties,
			"required": required,
			"additionalProperties": false,
		});

		OutputSchema { name: self.name, json: Arc::new(json) }
	}
}

/// A rendered schema. Cheap to clone.
#[derive(Debug, Clone)]
pub struct OutputSchema {
	name: &'static str,
	json: Arc<Value>,
}
impl OutputSchema {
	pub fn name(&self) -> &'static str {
		self.name
	}

	pub fn json(&self) -> &Value {
		&self.json
	}
}

const STYLE_RULES: &str = "Make the writing pertain to the user's question. \
Do not be flowery or verbose; get to the point. \
Surround the name of every mechanism and biohack with <b> </b> tags. \
Never give advice and never write opinionated phrases; state the specific facts and let the \
reader draw their own conclusions. \
Do not repeat yourself: a biohack topic appears in at most one item.";

pub const PERTINENCE: SchemaTemplate = SchemaTemplate {
	name: "pertinence",
	shape: Shape::Verdict,
	description: "Answer true or false: is this experience a concrete example of treatment \
outcomes pertaining to {question}?",
};

pub const BALANCE: SchemaTemplate = SchemaTemplate {
	name: "balance",
	shape: Shape::ItemList,
	description: "List and describe biohacks that balance against the intended direction or \
implicit premise of the user's question, {question}. For example, for \"Vegetarian diet and \
pregnancy\" an item could note that omega-3 supplementation led to fewer infant birth \
defects.",
};

pub const SKEPTICAL: SchemaTemplate = SchemaTemplate {
	name: "skeptical",
	shape: Shape::ItemList,
	description: "List and describe situations where the same biohack led to contradictory \
outcomes in different cases, positive in some and negative in others, as they relate to \
{question}.",
};

pub const CURIOUS: SchemaTemplate = SchemaTemplate {
	name: "curious",
	shape: Shape::ItemList,
	description: "List and describe the most surprising, novel, unexpected or highly impactful \
biohacking outcomes that pertain to {question}.",
};

pub const MECHANISMS: SchemaTemplate = SchemaTemplate {
	name: "mechanisms",
	shape: Shape::ItemList,
	description: "Describe the top causal mechanisms (pathways) shared by the successful \
biohacks that pertain to {question}, as a short science lesson.",
};

/// Writing rules appended to every narrative prompt.
pub fn style_rules() -> &'static str {
	STYLE_RULES
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verdict_schema_requires_every_property() {
		let schema = PERTINENCE.render("REM sleep");
		let json = schema.json();

		assert_eq!(schema.name(), "pertinence");
		assert_eq!(json["required"], serde_json::json!(["pertinent", "rationale"]));
		assert_eq!(json["additionalProperties"], false);
		assert!(
			json["properties"]["pertinent"]["description"]
				.as_str()
				.is_some_and(|text| text.contains("pertaining to REM sleep?"))
		);
	}

	#[test]
	fn list_schemas_share_one_shape() {
		for template in [BALANCE, SKEPTICAL, CURIOUS, MECHANISMS] {
			let schema = template.render("fatigue");

			assert_eq!(schema.json()["properties"]["items"]["type"], "array");
			assert!(!template.description.contains("fatigue"));
			assert!(schema.json().to_string().contains("fatigue"));
		}
	}

	#[test]
	fn decodes_verdict_without_rationale() {
		let verdict: Verdict = serde_json::from_value(serde_json::json!({ "pertinent": false }))
			.expect("Verdict must decode.");

		assert!(!verdict.pertinent);
		assert!(verdict.rationale.is_none());
	}
}
