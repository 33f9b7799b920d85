pub mod cache;
pub mod chain;
pub mod enrich;
pub mod gateway;
pub mod pertinence;
pub mod pipeline;
pub mod retrieval;
pub mod schema;

mod error;

pub use cache::{CacheEntry, CacheKey, CacheState, CacheValue, ResultCache};
pub use chain::{
	CallOptions, Chain, ChainError, ChainErrorKind, ChainRuntime, ModelChain, Prediction,
};
pub use error::{Error, Result};
pub use gateway::{
	BiohackView, CategoryView, ExperienceView, RelevancePolling, SearchResponse, SummaryPolling,
	SummaryResponse,
};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use biohack_config::{Config, LlmProviderConfig, SearchProviderConfig};
use biohack_providers::{
	completion::{CompletionClient, CompletionRequest},
	search_index::SearchIndexClient,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: CompletionRequest<'a>,
	) -> BoxFuture<'a, biohack_providers::Result<Value>>;
}

pub trait RetrievalProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a SearchProviderConfig,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, biohack_providers::Result<Vec<Value>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub completion: Arc<dyn CompletionProvider>,
	pub retrieval: Arc<dyn RetrievalProvider>,
}
impl Providers {
	pub fn new(
		completion: Arc<dyn CompletionProvider>,
		retrieval: Arc<dyn RetrievalProvider>,
	) -> Self {
		Self { completion, retrieval }
	}
}

pub struct BiohackService {
	pub cfg: Config,
	pub providers: Providers,
	pub cache: ResultCache,
	runtime: ChainRuntime,
}
impl BiohackService {
	/// Builds the service against the configured HTTP providers.
	pub fn new(cfg: Config) -> Result<Self> {
		let provider = Arc::new(DefaultProviders::new()?);
		let providers = Providers::new(provider.clone(), provider);

		Ok(Self::with_providers(cfg, providers))
	}

	pub fn with_providers(cfg: Config, providers: Providers) -> Self {
		let runtime = ChainRuntime::new(
			providers.completion.clone(),
			cfg.providers.llm.clone(),
			cfg.concurrency.max_in_flight as usize,
		);

		Self { cfg, providers, cache: ResultCache::default(), runtime }
	}

	pub fn runtime(&self) -> &ChainRuntime {
		&self.runtime
	}

	pub(crate) fn call_options(&self, settings: &biohack_config::ChainSettings) -> CallOptions {
		CallOptions::from_settings(settings, &self.cfg.providers.llm.model)
	}
}

struct DefaultProviders {
	completion: CompletionClient,
	search: SearchIndexClient,
}
impl DefaultProviders {
	fn new() -> biohack_providers::Result<Self> {
		Ok(Self { completion: CompletionClient::new()?, search: SearchIndexClient::new()? })
	}
}
impl CompletionProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: CompletionRequest<'a>,
	) -> BoxFuture<'a, biohack_providers::Result<Value>> {
		Box::pin(async move { self.completion.complete(cfg, &request).await })
	}
}
impl RetrievalProvider for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a SearchProviderConfig,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, biohack_providers::Result<Vec<Value>>> {
		Box::pin(self.search.search(cfg, query, limit))
	}
}
