pub mod bga;

pub use bga::{BgaClient, ScrapeOptions};
