pub mod card_analysis;
pub mod engine;
pub mod merge;
pub mod store;

pub use crate::domain::model::{Batch, Collection, Record, RecordKind};
pub use crate::domain::ports::{BatchProducer, Storage};
pub use crate::utils::error::Result;
