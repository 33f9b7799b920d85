//! In-process result cache keyed by normalized question.
//!
//! Entries are replaced wholesale and never expire. Each key has its own async lock, so a
//! request that arrives while the first computation for that key is still running awaits
//! the stored result instead of starting a second one.

use std::{
	collections::{HashMap, HashSet},
	fmt,
	future::Future,
	sync::{Arc, Mutex, MutexGuard},
};

use biohack_domain::{Summary, Taxonomy};

use crate::Result;

const SUMMARY_PREFIX: &str = "summary:";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
	Taxonomy(String),
	Summary(String),
}
impl CacheKey {
	pub fn question(&self) -> &str {
		match self {
			Self::Taxonomy(question) | Self::Summary(question) => question,
		}
	}

	/// Short digest for log lines that must not carry raw user text.
	pub fn log_prefix(&self) -> String {
		let hash = blake3::hash(self.to_string().as_bytes()).to_hex();

		hash.as_str()[..12].to_string()
	}
}
impl fmt::Display for CacheKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Taxonomy(question) => f.write_str(question),
			Self::Summary(question) => write!(f, "{SUMMARY_PREFIX}{question}"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
	Taxonomy(Arc<Taxonomy>),
	Summary(Arc<Summary>),
	/// Human-readable failure, shown once and then evicted.
	Error(String),
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
	pub value: CacheValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
	NotStarted,
	InProgress,
	Ready,
	Failed,
}

/// Whether a computed value is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retain {
	Store,
	Skip,
}

#[derive(Clone, Default)]
pub struct ResultCache {
	inner: Arc<Inner>,
}
impl ResultCache {
	pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
		lock(&self.inner.entries).get(key).cloned()
	}

	pub fn state(&self, key: &CacheKey) -> CacheState {
		match lock(&self.inner.entries).get(key).map(|entry| &entry.value) {
			Some(CacheValue::Error(_)) => CacheState::Failed,
			Some(_) => CacheState::Ready,
			None if lock(&self.inner.pending).contains(key) => CacheState::InProgress,
			None => CacheState::NotStarted,
		}
	}

	pub fn put(&self, key: CacheKey, value: CacheValue) {
		tracing::debug!(cache_key = %key.log_prefix(), "Storing cache entry.");

		lock(&self.inner.entries).insert(key, CacheEntry { value });
	}

	/// Removes the entry only if it holds an error, returning the message.
	pub fn evict_error(&self, key: &CacheKey) -> Option<String> {
		let mut entries = lock(&self.inner.entries);

		if !matches!(entries.get(key).map(|entry| &entry.value), Some(CacheValue::Error(_))) {
			return None;
		}

		match entries.remove(key)?.value {
			CacheValue::Error(message) => Some(message),
			_ => None,
		}
	}

	/// Marks `key` as in progress unless it already has a value or a running computation.
	/// The mark is cleared when the guard drops.
	pub fn try_begin(&self, key: &CacheKey) -> Option<PendingGuard> {
		let entries = lock(&self.inner.entries);
		let mut pending = lock(&self.inner.pending);

		if entries.contains_key(key) || !pending.insert(key.clone()) {
			return None;
		}

		Some(PendingGuard { inner: self.inner.clone(), key: key.clone() })
	}

	/// Returns the cached value for `key`, or runs `compute` while holding the key's lock.
	/// Concurrent callers for the same key wait and then read what the first caller stored.
	/// Errors are returned to the caller that ran `compute` and nothing is stored.
	pub async fn get_or_compute<F>(&self, key: &CacheKey, compute: F) -> Result<CacheValue>
	where
		F: Future<Output = Result<(CacheValue, Retain)>>,
	{
		if let Some(entry) = self.get(key) {
			tracing::info!(cache_key = %key.log_prefix(), "Cache hit.");

			return Ok(entry.value);
		}

		let key_lock = self.key_lock(key);
		let outcome = {
			let _held = key_lock.lock().await;

			match self.get(key) {
				Some(entry) => {
					tracing::info!(cache_key = %key.log_prefix(), "Cache filled while waiting.");

					Ok(entry.value)
				},
				None => {
					let _pending = {
						let mut pending = lock(&self.inner.pending);

						pending.insert(key.clone());

						PendingGuard { inner: self.inner.clone(), key: key.clone() }
					};

					match compute.await {
						Ok((value, Retain::Store)) => {
							self.put(key.clone(), value.clone());

							Ok(value)
						},
						Ok((value, Retain::Skip)) => Ok(value),
						Err(err) => Err(err),
					}
				},
			}
		};

		self.release_key_lock(key, key_lock);

		outcome
	}

	fn key_lock(&self, key: &CacheKey) -> Arc<tokio::sync::Mutex<()>> {
		lock(&self.inner.locks).entry(key.clone()).or_default().clone()
	}

	fn release_key_lock(&self, key: &CacheKey, key_lock: Arc<tokio::sync::Mutex<()>>) {
		let mut locks = lock(&self.inner.locks);

		drop(key_lock);

		if locks.get(key).is_some_and(|held| Arc::strong_count(held) == 1) {
			locks.remove(key);
		}
	}
}

/// Clears the in-progress mark for its key on drop.
pub struct PendingGuard {
	inner: Arc<Inner>,
	key: CacheKey,
}
impl PendingGuard {
	pub fn key(&self) -> &CacheKey {
		&self.key
	}
}
impl Drop for PendingGuard {
	fn drop(&mut self) {
		lock(&self.inner.pending).remove(&self.key);
	}
}

#[derive(Default)]
struct Inner {
	entries: Mutex<HashMap<CacheKey, CacheEntry>>,
	pending: Mutex<HashSet<CacheKey>>,
	locks: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn summary_keys_are_prefixed() {
		let key = CacheKey::Summary("REM sleep".to_string());

		assert_eq!(key.to_string(), "summary:REM sleep");
		assert_eq!(key.question(), "REM sleep");
		assert_eq!(key.log_prefix().len(), 12);
		assert_ne!(key.log_prefix(), CacheKey::Taxonomy("REM sleep".to_string()).log_prefix());
	}

	#[test]
	fn only_errors_are_evicted() {
		let cache = ResultCache::default();
		let taxonomy = CacheKey::Taxonomy("fatigue".to_string());
		let summary = CacheKey::Summary("fatigue".to_string());

		cache.put(taxonomy.clone(), CacheValue::Taxonomy(Arc::new(Taxonomy::default())));
		cache.put(summary.clone(), CacheValue::Error("No summary items.".to_string()));

		assert_eq!(cache.state(&summary), CacheState::Failed);
		assert_eq!(cache.evict_error(&taxonomy), None);
		assert_eq!(cache.evict_error(&summary).as_deref(), Some("No summary items."));
		assert_eq!(cache.state(&taxonomy), CacheState::Ready);
		assert_eq!(cache.state(&summary), CacheState::NotStarted);
	}

	#[test]
	fn pending_mark_is_exclusive_until_dropped() {
		let cache = ResultCache::default();
		let key = CacheKey::Summary("fatigue".to_string());
		let guard = cache.try_begin(&key).expect("First begin must succeed.");

		assert_eq!(cache.state(&key), CacheState::InProgress);
		assert!(cache.try_begin(&key).is_none());

		drop(guard);

		assert_eq!(cache.state(&key), CacheState::NotStarted);
		assert!(cache.try_begin(&key).is_some());
	}
}
