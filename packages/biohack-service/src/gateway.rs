//! Polling surface over the pipeline and the result cache.
//!
//! `search` is the only entry point that runs retrieval. The poll calls read the cache and
//! never block on model work; the summary poll additionally (re)schedules the background
//! summary when a taxonomy exists but no summary is stored or running.

use std::sync::Arc;

use serde::Serialize;

use biohack_domain::{Biohack, CategoryGroup, Record, SourceType, Summary, Taxonomy};

use crate::{
	BiohackService, Error, Result,
	cache::{CacheKey, CacheState, CacheValue, PendingGuard, Retain},
};

const BLANK_QUESTION: &str = "Please enter a question to search for.";
const EMPTY_SUMMARY: &str = "No summary could be produced for this question. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevancePolling {
	NotStarted,
	On,
	Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryPolling {
	Off,
	On,
	Finished,
	FinishedDueToError,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
	pub question: String,
	pub relevance_polling: RelevancePolling,
	pub summary_polling: SummaryPolling,
	pub count_experiences: usize,
	pub count_reddits: usize,
	pub count_studies: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub categories: Option<Vec<CategoryView>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}
impl SearchResponse {
	fn pending(question: String, relevance_polling: RelevancePolling) -> Self {
		Self {
			question,
			relevance_polling,
			summary_polling: SummaryPolling::Off,
			count_experiences: 0,
			count_reddits: 0,
			count_studies: 0,
			categories: None,
			error: None,
		}
	}

	fn finished(question: String, taxonomy: &Taxonomy, summary_polling: SummaryPolling) -> Self {
		Self {
			question,
			relevance_polling: RelevancePolling::Finished,
			summary_polling,
			count_experiences: taxonomy.count_experiences,
			count_reddits: taxonomy.count_for(SourceType::Reddit),
			count_studies: taxonomy.count_for(SourceType::Study),
			categories: Some(taxonomy.categories.iter().map(CategoryView::from).collect()),
			error: None,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
	pub question: String,
	pub relevance_polling: RelevancePolling,
	pub summary_polling: SummaryPolling,
	pub balance: Vec<String>,
	pub skeptical: Vec<String>,
	pub curious: Vec<String>,
	pub mechanisms: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}
impl SummaryResponse {
	fn status(
		question: String,
		relevance_polling: RelevancePolling,
		summary_polling: SummaryPolling,
	) -> Self {
		Self {
			question,
			relevance_polling,
			summary_polling,
			balance: Vec::new(),
			skeptical: Vec::new(),
			curious: Vec::new(),
			mechanisms: Vec::new(),
			error: None,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
	pub category: Option<String>,
	pub count_experiences: usize,
	pub biohacks: Vec<BiohackView>,
}
impl From<&CategoryGroup> for CategoryView {
	fn from(group: &CategoryGroup) -> Self {
		Self {
			category: group.category.clone(),
			count_experiences: group.record_count(),
			biohacks: group.biohacks.iter().map(BiohackView::from).collect(),
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct BiohackView {
	pub topic: Option<String>,
	pub category: Option<String>,
	pub mechanisms: Option<String>,
	pub count_experiences: usize,
	pub experiences: Vec<ExperienceView>,
}
impl From<&Biohack> for BiohackView {
	fn from(biohack: &Biohack) -> Self {
		Self {
			topic: biohack.topic.clone(),
			category: biohack.category().map(str::to_string),
			mechanisms: biohack.mechanisms(),
			count_experiences: biohack.records.len(),
			experiences: biohack.records.iter().map(ExperienceView::from).collect(),
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperienceView {
	pub permalink: String,
	pub url: String,
	pub source_type: SourceType,
	pub action: String,
	pub outcomes: String,
	pub health_disorder: Option<String>,
	pub personal_context: Option<String>,
}
impl From<&Record> for ExperienceView {
	fn from(record: &Record) -> Self {
		Self {
			permalink: record.permalink.clone(),
			url: record.url(),
			source_type: record.source_type(),
			action: record.action.clone(),
			outcomes: record.outcome.clone(),
			health_disorder: record.health_disorder.clone(),
			personal_context: record.personal_context.clone(),
		}
	}
}

impl BiohackService {
	/// Runs the pipeline on first request and serves the cached taxonomy afterwards. Schedules
	/// the background summary once a non-empty taxonomy exists.
	pub async fn search(self: &Arc<Self>, raw_question: &str) -> Result<SearchResponse> {
		let question = biohack_domain::normalize_query(raw_question);

		if question.is_empty() {
			return Err(Error::InvalidRequest { message: BLANK_QUESTION.to_string() });
		}

		let key = CacheKey::Taxonomy(question.clone());
		let value = self
			.cache
			.get_or_compute(&key, async {
				let taxonomy = self.build_taxonomy(&question).await?;
				let retain = if taxonomy.is_empty() { Retain::Skip } else { Retain::Store };

				Ok((CacheValue::Taxonomy(Arc::new(taxonomy)), retain))
			})
			.await?;
		let CacheValue::Taxonomy(taxonomy) = value else {
			return Err(Error::Internal {
				message: "Cached value for a search key is not a taxonomy.".to_string(),
			});
		};

		if taxonomy.is_empty() {
			tracing::info!(cache_key = %key.log_prefix(), "No pertinent experiences found.");

			return Ok(SearchResponse::pending(question, RelevancePolling::NotStarted));
		}

		self.schedule_summary(&question, taxonomy.clone());

		let summary_polling = self.summary_polling(&question);

		Ok(SearchResponse::finished(question, &taxonomy, summary_polling))
	}

	/// Reports the taxonomy state for a question without starting any work.
	pub fn poll_search(&self, raw_question: &str) -> SearchResponse {
		let question = biohack_domain::normalize_query(raw_question);

		if question.is_empty() {
			let mut response = SearchResponse::pending(question, RelevancePolling::NotStarted);

			response.error = Some(BLANK_QUESTION.to_string());

			return response;
		}

		let key = CacheKey::Taxonomy(question.clone());

		match self.cached_taxonomy(&question) {
			Some(taxonomy) => {
				let summary_polling = self.summary_polling(&question);

				SearchResponse::finished(question, &taxonomy, summary_polling)
			},
			None => match self.cache.state(&key) {
				CacheState::InProgress => SearchResponse::pending(question, RelevancePolling::On),
				_ => SearchResponse::pending(question, RelevancePolling::NotStarted),
			},
		}
	}

	/// Reports the summary state. A stored error is returned once and evicted, and the next
	/// poll schedules a fresh attempt.
	pub fn poll_summary(self: &Arc<Self>, raw_question: &str) -> SummaryResponse {
		let question = biohack_domain::normalize_query(raw_question);

		if question.is_empty() {
			let mut response = SummaryResponse::status(
				question,
				RelevancePolling::NotStarted,
				SummaryPolling::Off,
			);

			response.error = Some(BLANK_QUESTION.to_string());

			return response;
		}

		let Some(taxonomy) = self.cached_taxonomy(&question) else {
			let relevance_polling = match self.cache.state(&CacheKey::Taxonomy(question.clone())) {
				CacheState::InProgress => RelevancePolling::On,
				_ => RelevancePolling::NotStarted,
			};

			return SummaryResponse::status(question, relevance_polling, SummaryPolling::Off);
		};
		let key = CacheKey::Summary(question.clone());

		if let Some(message) = self.cache.evict_error(&key) {
			tracing::info!(cache_key = %key.log_prefix(), "Evicted failed summary.");

			let mut response = SummaryResponse::status(
				question,
				RelevancePolling::Finished,
				SummaryPolling::FinishedDueToError,
			);

			response.error = Some(message);

			return response;
		}

		match self.cache.get(&key).map(|entry| entry.value) {
			Some(CacheValue::Summary(summary)) => {
				let Summary { balance, skeptical, curious, mechanisms } = summary.as_ref().clone();

				SummaryResponse {
					question,
					relevance_polling: RelevancePolling::Finished,
					summary_polling: SummaryPolling::Finished,
					balance,
					skeptical,
					curious,
					mechanisms,
					error: None,
				}
			},
			_ => {
				self.schedule_summary(&question, taxonomy);

				SummaryResponse::status(question, RelevancePolling::Finished, SummaryPolling::On)
			},
		}
	}

	fn cached_taxonomy(&self, question: &str) -> Option<Arc<Taxonomy>> {
		match self.cache.get(&CacheKey::Taxonomy(question.to_string()))?.value {
			CacheValue::Taxonomy(taxonomy) => Some(taxonomy),
			_ => None,
		}
	}

	fn summary_polling(&self, question: &str) -> SummaryPolling {
		match self.cache.state(&CacheKey::Summary(question.to_string())) {
			CacheState::Ready => SummaryPolling::Finished,
			CacheState::Failed => SummaryPolling::FinishedDueToError,
			CacheState::InProgress => SummaryPolling::On,
			CacheState::NotStarted => SummaryPolling::Off,
		}
	}

	/// Starts the summary task unless one is stored or already running. Returns whether a
	/// task was spawned.
	fn schedule_summary(self: &Arc<Self>, question: &str, taxonomy: Arc<Taxonomy>) -> bool {
		let Some(guard) = self.cache.try_begin(&CacheKey::Summary(question.to_string())) else {
			return false;
		};
		let service = Arc::clone(self);

		tracing::info!(cache_key = %guard.key().log_prefix(), "Scheduling summary.");

		tokio::spawn(async move { service.run_summary(guard, taxonomy).await });

		true
	}

	async fn run_summary(&self, guard: PendingGuard, taxonomy: Arc<Taxonomy>) {
		let key = guard.key().clone();
		let summary = self.summarize(key.question(), &taxonomy).await;
		let value = if summary.is_vacuous() {
			tracing::warn!(
				cache_key = %key.log_prefix(),
				balance = summary.balance.len(),
				skeptical = summary.skeptical.len(),
				curious = summary.curious.len(),
				"Summary is missing a narrative list."
			);

			CacheValue::Error(EMPTY_SUMMARY.to_string())
		} else {
			tracing::info!(
				cache_key = %key.log_prefix(),
				items = summary.item_count(),
				"Summary ready."
			);

			CacheValue::Summary(Arc::new(summary))
		};

		self.cache.put(key, value);

		drop(guard);
	}
}
