//! Typed request/response chains over the generative model.
//!
//! A [`Chain`] fixes an input type, an output contract and a prompt renderer. [`ModelChain`]
//! runs it: single calls through [`ModelChain::predict`], and aligned concurrent batches
//! through [`ModelChain::batch_predict`]. Failures are returned as [`ChainError`] values in
//! the output slot of the item that failed and never abort sibling calls.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use serde::{Serialize, de::DeserializeOwned};
use tokio::{sync::Semaphore, task::JoinSet};

use biohack_config::{ChainSettings, LlmProviderConfig};
use biohack_providers::completion::CompletionRequest;

use crate::{CompletionProvider, schema::OutputSchema};

pub type Prediction<T> = std::result::Result<T, ChainError>;

pub trait Chain
where
	Self: Send + Sync,
{
	type Input;
	type Output: DeserializeOwned + Send + 'static;

	fn name(&self) -> &'static str;

	fn schema(&self) -> &OutputSchema;

	fn render(&self, input: &Self::Input) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainErrorKind {
	/// The answer did not match the declared output contract.
	Validation,
	/// The provider's content filter rejected the call.
	Policy,
	/// Timeouts, connection failures, throttling and upstream 5xx.
	Connectivity,
	Unknown,
}
impl ChainErrorKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Validation => "validation",
			Self::Policy => "policy",
			Self::Connectivity => "connectivity",
			Self::Unknown => "unknown",
		}
	}

	fn is_retryable(self) -> bool {
		matches!(self, Self::Validation | Self::Connectivity)
	}
}
impl fmt::Display for ChainErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{chain} call failed with a {kind} error: {message}")]
pub struct ChainError {
	pub kind: ChainErrorKind,
	pub chain: &'static str,
	pub message: String,
}
impl ChainError {
	pub fn new(kind: ChainErrorKind, chain: &'static str, message: impl Into<String>) -> Self {
		Self { kind, chain, message: message.into() }
	}

	fn from_provider(chain: &'static str, err: biohack_providers::Error) -> Self {
		use biohack_providers::Error as ProviderError;

		let kind = match &err {
			ProviderError::ContentPolicy { .. } => ChainErrorKind::Policy,
			ProviderError::SerdeJson(_) => ChainErrorKind::Validation,
			err if err.is_transient() => ChainErrorKind::Connectivity,
			_ => ChainErrorKind::Unknown,
		};

		Self::new(kind, chain, err.to_string())
	}
}

/// Per-call knobs. `batch_size` only drives chunking and accounting; in-flight calls are
/// capped separately by the runtime's limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOptions {
	pub model: String,
	pub batch_size: usize,
	pub max_tokens: u32,
	pub max_retries: u32,
	pub timeout: Duration,
}
impl CallOptions {
	pub fn from_settings(settings: &ChainSettings, fallback_model: &str) -> Self {
		Self {
			model: settings.model_or(fallback_model).to_string(),
			batch_size: (settings.batch_size as usize).max(1),
			max_tokens: settings.max_tokens,
			max_retries: settings.max_retries,
			timeout: Duration::from_millis(settings.timeout_ms),
		}
	}
}

/// Everything a chain needs to reach the model. Shared by every chain in the process so the
/// limiter bounds total outbound concurrency.
#[derive(Clone)]
pub struct ChainRuntime {
	provider: Arc<dyn CompletionProvider>,
	llm: Arc<LlmProviderConfig>,
	limiter: Arc<Semaphore>,
}
impl ChainRuntime {
	pub fn new(
		provider: Arc<dyn CompletionProvider>,
		llm: LlmProviderConfig,
		max_in_flight: usize,
	) -> Self {
		Self { provider, llm: Arc::new(llm), limiter: Arc::new(Semaphore::new(max_in_flight.max(1))) }
	}
}

pub struct ModelChain<C> {
	chain: C,
	runtime: ChainRuntime,
}
impl<C> ModelChain<C>
where
	C: Chain,
{
	pub fn new(chain: C, runtime: ChainRuntime) -> Self {
		Self { chain, runtime }
	}

	pub async fn predict(&self, input: &C::Input, opts: &CallOptions) -> Prediction<C::Output> {
		self.call(self.chain.render(input), opts.clone()).await
	}

	/// Blocks the current thread on [`ModelChain::predict`]. Must not be called from inside
	/// an async runtime.
	pub fn predict_blocking(&self, input: &C::Input, opts: &CallOptions) -> Prediction<C::Output> {
		let runtime = tokio::runtime::Builder::new_current_thread()
			.enable_all()
			.build()
			.map_err(|err| {
				ChainError::new(ChainErrorKind::Unknown, self.chain.name(), err.to_string())
			})?;

		runtime.block_on(self.predict(input, opts))
	}

	/// Returns one prediction per input, in input order. Inputs are dispatched in chunks of
	/// `opts.batch_size`; a chunk starts only after the previous one has fully settled.
	pub async fn batch_predict(
		&self,
		inputs: &[C::Input],
		opts: &CallOptions,
	) -> Vec<Prediction<C::Output>> {
		let name = self.chain.name();
		let prompts: Vec<String> = inputs.iter().map(|input| self.chain.render(input)).collect();
		let batch_size = opts.batch_size.max(1);
		let chunk_count = prompts.len().div_ceil(batch_size);
		let mut predictions = Vec::with_capacity(prompts.len());

		for (chunk_index, chunk) in prompts.chunks(batch_size).enumerate() {
			tracing::debug!(
				chain = name,
				chunk = chunk_index,
				chunk_count,
				size = chunk.len(),
				"Dispatching chunk."
			);

			let mut tasks = JoinSet::new();
			let mut slots = HashMap::with_capacity(chunk.len());
			let mut settled: Vec<Option<Prediction<C::Output>>> =
				(0..chunk.len()).map(|_| None).collect();

			for (offset, prompt) in chunk.iter().enumerate() {
				let handle = tasks.spawn(call_with_retries::<C::Output>(
					self.runtime.clone(),
					name,
					self.chain.schema().clone(),
					prompt.clone(),
					opts.clone(),
				));

				slots.insert(handle.id(), offset);
			}

			while let Some(joined) = tasks.join_next_with_id().await {
				let (id, prediction) = match joined {
					Ok((id, prediction)) => (id, prediction),
					Err(err) => (
						err.id(),
						Err(ChainError::new(
							ChainErrorKind::Unknown,
							name,
							format!("Model call task failed: {err}"),
						)),
					),
				};

				if let Some(&offset) = slots.get(&id) {
					settled[offset] = Some(prediction);
				}
			}

			let chunk_predictions: Vec<Prediction<C::Output>> = settled
				.into_iter()
				.map(|slot| {
					slot.unwrap_or_else(|| {
						Err(ChainError::new(ChainErrorKind::Unknown, name, "Model call result was lost."))
					})
				})
				.collect();
			let errors = chunk_predictions.iter().filter(|prediction| prediction.is_err()).count();

			if errors > 0 {
				tracing::warn!(
					chain = name,
					chunk = chunk_index,
					chunk_count,
					errors,
					"Chunk finished with errors."
				);
			} else {
				tracing::debug!(chain = name, chunk = chunk_index, chunk_count, "Chunk finished.");
			}

			predictions.extend(chunk_predictions);
		}

		predictions
	}

	async fn call(&self, prompt: String, opts: CallOptions) -> Prediction<C::Output> {
		let schema = self.chain.schema().clone();

		call_with_retries(self.runtime.clone(), self.chain.name(), schema, prompt, opts).await
	}
}

async fn call_with_retries<T>(
	runtime: ChainRuntime,
	name: &'static str,
	schema: OutputSchema,
	prompt: String,
	opts: CallOptions,
) -> Prediction<T>
where
	T: DeserializeOwned + Send,
{
	let mut attempt = 0;

	loop {
		match call_once::<T>(&runtime, name, &schema, &prompt, &opts).await {
			Err(err) if err.kind.is_retryable() && attempt < opts.max_retries => {
				attempt += 1;

				tracing::debug!(chain = name, attempt, kind = %err.kind, "Retrying model call.");
			},
			Err(err) => {
				match err.kind {
					ChainErrorKind::Unknown => {
						tracing::error!(chain = name, error = %err, "Model call failed.")
					},
					_ => tracing::warn!(chain = name, kind = %err.kind, error = %err, "Model call failed."),
				}

				return Err(err);
			},
			Ok(output) => return Ok(output),
		}
	}
}

async fn call_once<T>(
	runtime: &ChainRuntime,
	name: &'static str,
	schema: &OutputSchema,
	prompt: &str,
	opts: &CallOptions,
) -> Prediction<T>
where
	T: DeserializeOwned,
{
	let Ok(_permit) = runtime.limiter.acquire().await else {
		return Err(ChainError::new(ChainErrorKind::Unknown, name, "Model call limiter is closed."));
	};
	let request = CompletionRequest {
		model: &opts.model,
		prompt,
		schema_name: schema.name(),
		schema: schema.json(),
		max_tokens: opts.max_tokens,
		timeout: opts.timeout,
	};
	let completion = runtime.provider.complete(&runtime.llm, request);
	let raw = match tokio::time::timeout(opts.timeout, completion).await {
		Ok(Ok(raw)) => raw,
		Ok(Err(err)) => return Err(ChainError::from_provider(name, err)),
		Err(_) => {
			return Err(ChainError::new(
				ChainErrorKind::Connectivity,
				name,
				format!("Model call timed out after {} ms.", opts.timeout.as_millis()),
			));
		},
	};

	serde_json::from_value(raw)
		.map_err(|err| ChainError::new(ChainErrorKind::Validation, name, err.to_string()))
}
