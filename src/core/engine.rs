use crate::core::merge::{format_timestamp, merge};
use crate::core::store::CollectionStore;
use crate::domain::model::RecordKind;
use crate::domain::ports::{BatchProducer, Storage};
use crate::utils::error::{Result, StatsError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// When to clear the batch file after a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum ResetPolicy {
    /// Only after at least one record was added. An all-duplicate batch stays on
    /// disk so it can be inspected.
    #[default]
    OnAdded,
    Always,
    Never,
}

impl ResetPolicy {
    pub fn should_reset(self, added: usize) -> bool {
        match self {
            Self::OnAdded => added > 0,
            Self::Always => true,
            Self::Never => false,
        }
    }
}

impl fmt::Display for ResetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OnAdded => "on-added",
            Self::Always => "always",
            Self::Never => "never",
        })
    }
}

impl FromStr for ResetPolicy {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "on-added" => Ok(Self::OnAdded),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            other => Err(StatsError::InvalidConfigValueError {
                field: "merge.reset_policy".to_string(),
                value: other.to_string(),
                reason: "Valid values: on-added, always, never".to_string(),
            }),
        }
    }
}

/// One batch file to fold into one collection file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeJob {
    pub kind: RecordKind,
    pub batch_path: String,
    pub collection_path: String,
}

impl MergeJob {
    pub fn new(kind: RecordKind, batch_path: impl Into<String>, collection_path: impl Into<String>) -> Self {
        Self {
            kind,
            batch_path: batch_path.into(),
            collection_path: collection_path.into(),
        }
    }

    /// `<scraper_dir>/new_games.json` into `<data_dir>/detailed_games.json`, and the logs equivalent.
    pub fn with_defaults(kind: RecordKind, data_dir: &str, scraper_dir: &str) -> Self {
        Self::new(
            kind,
            join(scraper_dir, kind.batch_file()),
            join(data_dir, kind.collection_file()),
        )
    }
}

fn join(dir: &str, file: &str) -> String {
    Path::new(dir).join(file).to_string_lossy().into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub kind: RecordKind,
    pub added_ids: Vec<String>,
    pub total: usize,
    pub batch_reset: bool,
}

impl MergeReport {
    pub fn added(&self) -> usize {
        self.added_ids.len()
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: Added {} new {} (total: {})",
            capitalize(self.kind.records_key()),
            self.added(),
            self.kind,
            self.total
        )?;
        if !self.added_ids.is_empty() {
            write!(f, "\n  New IDs: {}", self.added_ids.join(", "))?;
        }
        Ok(())
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Load → merge → write back → reset, for each job in turn.
pub struct MergeEngine<S: Storage> {
    store: CollectionStore<S>,
    reset_policy: ResetPolicy,
}

impl<S: Storage> MergeEngine<S> {
    pub fn new(storage: S) -> Self {
        Self {
            store: CollectionStore::new(storage),
            reset_policy: ResetPolicy::default(),
        }
    }

    pub fn with_reset_policy(mut self, reset_policy: ResetPolicy) -> Self {
        self.reset_policy = reset_policy;
        self
    }

    pub fn store(&self) -> &CollectionStore<S> {
        &self.store
    }

    pub async fn run(&self, job: &MergeJob) -> Result<MergeReport> {
        tracing::info!(
            "Merging {} from {} into {}",
            job.kind,
            job.batch_path,
            job.collection_path
        );

        let collection = self
            .store
            .load_collection(job.kind, &job.collection_path)
            .await?;
        let batch = self.store.load_batch(job.kind, &job.batch_path).await?;
        tracing::debug!(
            "Collection has {} {}, batch has {} candidates",
            collection.len(),
            job.kind,
            batch.len()
        );

        let outcome = merge(collection, batch)?;
        self.store
            .save_collection(&job.collection_path, &outcome.collection)
            .await?;

        let batch_reset = self.reset_policy.should_reset(outcome.added());
        if batch_reset {
            self.store.reset_batch(job.kind, &job.batch_path).await?;
        }

        let report = MergeReport {
            kind: job.kind,
            total: outcome.total(),
            added_ids: outcome.added_ids,
            batch_reset,
        };
        tracing::info!(
            "Added {} new {} (total: {}), batch reset: {}",
            report.added(),
            report.kind,
            report.total,
            report.batch_reset
        );
        Ok(report)
    }

    /// Stops at the first failing job; collections merged before it stay written.
    pub async fn run_all(&self, jobs: &[MergeJob]) -> Result<Vec<MergeReport>> {
        let mut reports = Vec::with_capacity(jobs.len());
        for job in jobs {
            reports.push(self.run(job).await?);
        }
        Ok(reports)
    }

    /// Asks a producer for a batch and writes it where a later merge will pick it up.
    /// An empty batch writes nothing, so an unmerged batch file survives a failed scrape.
    pub async fn stage<P: BatchProducer + ?Sized>(&self, producer: &P, batch_path: &str) -> Result<usize> {
        let batch = producer.produce().await?;
        if batch.is_empty() {
            tracing::warn!("No {} found, leaving {} untouched", batch.kind, batch_path);
            return Ok(0);
        }

        let count = batch.len();
        self.store
            .save_batch(batch_path, &batch, format_timestamp(Utc::now()))
            .await?;
        tracing::info!("Saved {} {} to {}", count, batch.kind, batch_path);
        Ok(count)
    }
}
