use std::collections::BTreeMap;

use ahash::AHashMap;
use serde::Serialize;

use crate::record::{Record, SourceType};

/// Records that share a topic label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Biohack {
	pub topic: Option<String>,
	pub records: Vec<Record>,
}
impl Biohack {
	/// Members are assumed to share a category, so the first record decides.
	pub fn category(&self) -> Option<&str> {
		self.records.first().and_then(|record| record.category.as_deref())
	}

	pub fn mechanisms(&self) -> Option<String> {
		let mut seen = Vec::<&str>::new();

		for mechanism in self.records.iter().filter_map(|record| record.mechanism.as_deref()) {
			for part in mechanism.split(',').map(str::trim).filter(|part| !part.is_empty()) {
				if !seen.contains(&part) {
					seen.push(part);
				}
			}
		}

		if seen.is_empty() { None } else { Some(seen.join(", ")) }
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGroup {
	pub category: Option<String>,
	pub biohacks: Vec<Biohack>,
}
impl CategoryGroup {
	pub fn record_count(&self) -> usize {
		self.biohacks.iter().map(|biohack| biohack.records.len()).sum()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Taxonomy {
	pub categories: Vec<CategoryGroup>,
	pub count_experiences: usize,
	pub source_counts: BTreeMap<SourceType, usize>,
}
impl Taxonomy {
	pub fn is_empty(&self) -> bool {
		self.count_experiences == 0
	}

	pub fn count_for(&self, source_type: SourceType) -> usize {
		self.source_counts.get(&source_type).copied().unwrap_or(0)
	}

	pub fn biohacks(&self) -> impl Iterator<Item = &Biohack> {
		self.categories.iter().flat_map(|group| group.biohacks.iter())
	}

	pub fn records(&self) -> impl Iterator<Item = &Record> {
		self.biohacks().flat_map(|biohack| biohack.records.iter())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TopicKey {
	Named(String),
	// Unlabelled records never share a group.
	Unclustered(usize),
}

/// Groups records by topic, then groups the resulting biohacks by category. Groups keep the
/// order in which their key was first seen.
pub fn build_taxonomy(records: Vec<Record>) -> Taxonomy {
	let count_experiences = records.len();
	let mut source_counts = BTreeMap::new();
	let mut biohacks: Vec<Biohack> = Vec::new();
	let mut topic_index: AHashMap<TopicKey, usize> = AHashMap::new();

	for (position, record) in records.into_iter().enumerate() {
		*source_counts.entry(record.source_type()).or_insert(0) += 1;

		let key = match record.topic.as_ref() {
			Some(topic) => TopicKey::Named(topic.clone()),
			None => TopicKey::Unclustered(position),
		};
		let slot = *topic_index.entry(key).or_insert_with(|| {
			biohacks.push(Biohack { topic: record.topic.clone(), records: Vec::new() });

			biohacks.len() - 1
		});

		biohacks[slot].records.push(record);
	}

	let mut categories: Vec<CategoryGroup> = Vec::new();
	let mut category_index: AHashMap<Option<String>, usize> = AHashMap::new();

	for biohack in biohacks {
		let key = biohack.category().map(str::to_string);
		let slot = *category_index.entry(key.clone()).or_insert_with(|| {
			categories.push(CategoryGroup { category: key, biohacks: Vec::new() });

			categories.len() - 1
		});

		categories[slot].biohacks.push(biohack);
	}

	Taxonomy { categories, count_experiences, source_counts }
}
