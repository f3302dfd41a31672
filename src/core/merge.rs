use crate::domain::model::{Batch, Collection, Record};
use crate::utils::error::{Result, StatsError};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashSet;

/// Updated collection plus the identifiers that were actually admitted, in batch order.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub collection: Collection,
    pub added_ids: Vec<String>,
}

impl MergeOutcome {
    pub fn added(&self) -> usize {
        self.added_ids.len()
    }

    pub fn total(&self) -> usize {
        self.collection.len()
    }
}

pub fn merge(collection: Collection, batch: Batch) -> Result<MergeOutcome> {
    merge_at(collection, batch, Utc::now())
}

/// Appends every batch record whose `tableId` is not yet in the collection.
///
/// Records are admitted whole; nothing is merged field by field. Known
/// identifiers, including repeats inside the batch itself, are skipped.
/// All identifiers are checked before anything is appended, so a malformed
/// record anywhere leaves the collection as it was.
pub fn merge_at(
    mut collection: Collection,
    batch: Batch,
    now: DateTime<Utc>,
) -> Result<MergeOutcome> {
    if collection.kind != batch.kind {
        return Err(StatsError::malformed(
            format!("{} batch", batch.kind),
            format!("cannot merge into a {} collection", collection.kind),
        ));
    }

    let existing = collect_ids(&collection.records, &format!("{} collection", collection.kind))?;
    let incoming = collect_ids(&batch.records, &format!("{} batch", batch.kind))?;

    let mut seen: HashSet<String> = HashSet::with_capacity(existing.len() + incoming.len());
    for id in existing {
        if !seen.insert(id.clone()) {
            tracing::warn!("Collection already holds duplicate tableId {}", id);
        }
    }

    let mut added_ids = Vec::new();
    for (record, id) in batch.records.into_iter().zip(incoming) {
        if seen.insert(id.clone()) {
            collection.records.push(record);
            added_ids.push(id);
        } else {
            tracing::debug!("Skipping known {} record {}", collection.kind, id);
        }
    }

    collection.touch(format_timestamp(now));

    Ok(MergeOutcome {
        collection,
        added_ids,
    })
}

/// `2025-01-31T18:04:05.123Z`
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn collect_ids(records: &[Record], source_name: &str) -> Result<Vec<String>> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            record.table_id().ok_or_else(|| {
                StatsError::malformed(
                    source_name,
                    format!("record #{} has no non-empty tableId", index),
                )
            })
        })
        .collect()
}
