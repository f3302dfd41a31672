pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{cli::LocalStorage, toml_config::TomlConfig};

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use core::card_analysis::{CardAnalysis, CardReport, RankingOptions};
pub use core::engine::{MergeEngine, MergeJob, MergeReport, ResetPolicy};
pub use core::merge::{merge, merge_at, MergeOutcome};
pub use domain::model::{Batch, Collection, Record, RecordKind};
pub use utils::error::{Result, StatsError};
