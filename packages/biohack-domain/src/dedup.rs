use ahash::AHashSet;

use crate::record::Record;

/// Drops records whose action and outcome text exactly repeat an earlier record. The first
/// occurrence wins and input order is kept.
pub fn dedup_records(records: Vec<Record>) -> Vec<Record> {
	let mut seen = AHashSet::with_capacity(records.len());

	records.into_iter().filter(|record| seen.insert(record.fingerprint())).collect()
}
