//! Offline fakes and fixtures for exercising the service without a network.

mod error;

pub use error::{Error, Result};

use std::{
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::Value;

use biohack_config::{Config, LlmProviderConfig, SearchProviderConfig};
use biohack_domain::Record;
use biohack_providers::completion::CompletionRequest;
use biohack_service::{BiohackService, BoxFuture, CompletionProvider, Providers, RetrievalProvider};

const TEST_CONFIG: &str = r#"
[service]
http_bind = "127.0.0.1:0"
log_level = "debug"

[providers.llm]
provider_id = "scripted"
api_base    = "http://127.0.0.1:9"
api_key     = "test-key"
path        = "/chat/completions"
model       = "test-model"
temperature = 0.0
timeout_ms  = 1000

[providers.search]
provider_id   = "static"
api_base      = "http://127.0.0.1:9"
api_key       = "test-key"
path          = "/search"
timeout_ms    = 1000
vector_fields = []

[retrieval]
limit              = 100
min_action_score   = 2
min_outcomes_score = 2

[chains.pertinence]
batch_size  = 4
max_tokens  = 100
max_retries = 0
timeout_ms  = 1000

[chains.summary]
batch_size  = 1
max_tokens  = 1000
max_retries = 0
timeout_ms  = 1000

[chains.mechanisms]
batch_size  = 2
max_tokens  = 500
max_retries = 0
timeout_ms  = 1000

[concurrency]
max_in_flight = 8
"#;

/// Config with short timeouts, small batches and no retries.
pub fn test_config() -> Result<Config> {
	Ok(biohack_config::parse(TEST_CONFIG)?)
}

pub fn service(
	model: Arc<ScriptedModel>,
	retrieval: Arc<StaticRetrieval>,
) -> Result<Arc<BiohackService>> {
	service_with_config(test_config()?, model, retrieval)
}

pub fn service_with_config(
	cfg: Config,
	model: Arc<ScriptedModel>,
	retrieval: Arc<StaticRetrieval>,
) -> Result<Arc<BiohackService>> {
	let providers = Providers::new(model, retrieval);

	Ok(Arc::new(BiohackService::with_providers(cfg, providers)))
}

/// Builds valid records; every default passes the quality filter of [`test_config`].
#[derive(Debug, Clone)]
pub struct RecordBuilder {
	record: Record,
}
impl RecordBuilder {
	pub fn new(permalink: impl Into<String>) -> Self {
		Self {
			record: Record {
				permalink: permalink.into(),
				action: "Took magnesium glycinate".to_string(),
				outcome: "Fell asleep faster".to_string(),
				health_disorder: Some("insomnia".to_string()),
				mechanism: Some("GABA modulation".to_string()),
				personal_context: None,
				topic: Some("Magnesium".to_string()),
				category: Some("supplement".to_string()),
				action_score: Some(5),
				outcomes_score: Some(5),
			},
		}
	}

	pub fn outcome(mut self, outcome: impl Into<String>) -> Self {
		self.record.outcome = outcome.into();

		self
	}

	pub fn topic(mut self, topic: Option<&str>) -> Self {
		self.record.topic = topic.map(str::to_string);

		self
	}

	pub fn category(mut self, category: Option<&str>) -> Self {
		self.record.category = category.map(str::to_string);

		self
	}

	pub fn scores(mut self, action: Option<i64>, outcomes: Option<i64>) -> Self {
		self.record.action_score = action;
		self.record.outcomes_score = outcomes;

		self
	}

	pub fn build(self) -> Record {
		self.record
	}

	/// The record as a raw search index hit.
	pub fn hit(self) -> Value {
		serde_json::to_value(self.record).unwrap_or(Value::Null)
	}
}

/// `count` distinct valid records sharing one topic.
pub fn records(count: usize) -> Vec<Record> {
	(0..count)
		.map(|i| {
			RecordBuilder::new(format!("/r/sleep/comments/{i}"))
				.outcome(format!("Outcome {i}"))
				.build()
		})
		.collect()
}

pub fn hits(records: &[Record]) -> Vec<Value> {
	records.iter().filter_map(|record| serde_json::to_value(record).ok()).collect()
}

pub fn verdict(pertinent: bool) -> Value {
	serde_json::json!({ "pertinent": pertinent, "rationale": null })
}

pub fn items(items: &[&str]) -> Value {
	serde_json::json!({ "items": items })
}

/// What the fake model saw for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCall {
	pub model: String,
	pub schema_name: String,
	pub prompt: String,
}

pub struct ScriptedReply {
	pub delay: Duration,
	pub result: biohack_providers::Result<Value>,
}
impl ScriptedReply {
	pub fn ok(value: Value) -> Self {
		Self { delay: Duration::ZERO, result: Ok(value) }
	}

	pub fn err(err: biohack_providers::Error) -> Self {
		Self { delay: Duration::ZERO, result: Err(err) }
	}

	pub fn after(mut self, delay: Duration) -> Self {
		self.delay = delay;

		self
	}
}

type Script = dyn Fn(&ModelCall) -> ScriptedReply + Send + Sync;

/// Completion provider driven by a closure. Records every call and the peak number of calls
/// in flight at once.
pub struct ScriptedModel {
	script: Box<Script>,
	calls: Mutex<Vec<ModelCall>>,
	in_flight: AtomicUsize,
	peak_in_flight: AtomicUsize,
}
impl ScriptedModel {
	pub fn new<F>(script: F) -> Arc<Self>
	where
		F: Fn(&ModelCall) -> ScriptedReply + Send + Sync + 'static,
	{
		Arc::new(Self {
			script: Box::new(script),
			calls: Mutex::new(Vec::new()),
			in_flight: AtomicUsize::new(0),
			peak_in_flight: AtomicUsize::new(0),
		})
	}

	/// Everything pertinent; every list enricher returns one item named after its schema.
	pub fn agreeable() -> Arc<Self> {
		Self::new(|call| match call.schema_name.as_str() {
			"pertinence" => ScriptedReply::ok(verdict(true)),
			name => ScriptedReply::ok(items(&[&format!("<b>{name}</b> item")])),
		})
	}

	pub fn calls(&self) -> Vec<ModelCall> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn call_count(&self, schema_name: &str) -> usize {
		self.calls
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.iter()
			.filter(|call| call.schema_name == schema_name)
			.count()
	}

	pub fn peak_in_flight(&self) -> usize {
		self.peak_in_flight.load(Ordering::SeqCst)
	}
}
impl CompletionProvider for ScriptedModel {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		request: CompletionRequest<'a>,
	) -> BoxFuture<'a, biohack_providers::Result<Value>> {
		let call = ModelCall {
			model: request.model.to_string(),
			schema_name: request.schema_name.to_string(),
			prompt: request.prompt.to_string(),
		};
		let reply = (self.script)(&call);

		self.calls.lock().unwrap_or_else(|err| err.into_inner()).push(call);

		Box::pin(async move {
			let _in_flight = InFlight::enter(&self.in_flight, &self.peak_in_flight);

			if !reply.delay.is_zero() {
				tokio::time::sleep(reply.delay).await;
			}

			reply.result
		})
	}
}

/// Search index fake serving a fixed hit list.
pub struct StaticRetrieval {
	hits: Vec<Value>,
	fail_status: Option<u16>,
	delay: Duration,
	calls: AtomicUsize,
}
impl StaticRetrieval {
	pub fn new(hits: Vec<Value>) -> Arc<Self> {
		Arc::new(Self { hits, fail_status: None, delay: Duration::ZERO, calls: AtomicUsize::new(0) })
	}

	pub fn with_delay(hits: Vec<Value>, delay: Duration) -> Arc<Self> {
		Arc::new(Self { hits, fail_status: None, delay, calls: AtomicUsize::new(0) })
	}

	/// Every search fails with the given HTTP status.
	pub fn failing(status: u16) -> Arc<Self> {
		Arc::new(Self {
			hits: Vec::new(),
			fail_status: Some(status),
			delay: Duration::ZERO,
			calls: AtomicUsize::new(0),
		})
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl RetrievalProvider for StaticRetrieval {
	fn search<'a>(
		&'a self,
		_cfg: &'a SearchProviderConfig,
		_query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, biohack_providers::Result<Vec<Value>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}
			if let Some(status) = self.fail_status {
				return Err(biohack_providers::Error::Status {
					status,
					body: "search index unavailable".to_string(),
				});
			}

			Ok(self.hits.iter().take(limit as usize).cloned().collect())
		})
	}
}

struct InFlight<'a> {
	current: &'a AtomicUsize,
}
impl<'a> InFlight<'a> {
	fn enter(current: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
		let now = current.fetch_add(1, Ordering::SeqCst) + 1;

		peak.fetch_max(now, Ordering::SeqCst);

		Self { current }
	}
}
impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		self.current.fetch_sub(1, Ordering::SeqCst);
	}
}
