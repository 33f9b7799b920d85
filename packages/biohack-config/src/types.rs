use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	pub retrieval: Retrieval,
	pub chains: Chains,
	pub concurrency: Concurrency,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub llm: LlmProviderConfig,
	pub search: SearchProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	/// Index-relative search path, including any api-version query string.
	pub path: String,
	pub timeout_ms: u64,
	/// Vector fields used for the integrated-vectorization half of the hybrid query. Empty
	/// means keyword-only retrieval.
	#[serde(default)]
	pub vector_fields: Vec<String>,
	#[serde(default = "default_k_nearest")]
	pub k_nearest: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Retrieval {
	pub limit: u32,
	pub min_action_score: i64,
	pub min_outcomes_score: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chains {
	pub pertinence: ChainSettings,
	pub summary: ChainSettings,
	pub mechanisms: ChainSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainSettings {
	/// Optional. Falls back to `providers.llm.model`.
	pub model: Option<String>,
	pub batch_size: u32,
	pub max_tokens: u32,
	pub max_retries: u32,
	pub timeout_ms: u64,
}
impl ChainSettings {
	pub fn model_or<'a>(&'a self, fallback: &'a str) -> &'a str {
		self.model.as_deref().unwrap_or(fallback)
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Concurrency {
	/// Upper bound on outbound model calls in flight across every chain.
	pub max_in_flight: u32,
}

fn default_k_nearest() -> u32 {
	10
}
