pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use args::{AnalyzeArgs, CliConfig, Command, MergeArgs, ScrapeArgs};

#[cfg(feature = "cli")]
mod args {
    use super::toml_config::TomlConfig;
    use crate::core::engine::{MergeJob, ResetPolicy};
    use crate::domain::model::RecordKind;
    use clap::{Args, Parser, Subcommand};
    use std::path::Path;

    #[derive(Debug, Clone, Parser)]
    #[command(name = "arknova-stats")]
    #[command(about = "Collect, merge and analyze Ark Nova games from Board Game Arena")]
    pub struct CliConfig {
        #[command(subcommand)]
        pub command: Command,

        /// Path to TOML configuration file (defaults to ./arknova-stats.toml when present)
        #[arg(short, long, global = true)]
        pub config: Option<String>,

        #[arg(short, long, global = true, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, global = true, help = "Emit logs as JSON lines")]
        pub log_json: bool,
    }

    #[derive(Debug, Clone, Subcommand)]
    pub enum Command {
        /// Merge newly collected games and logs into the accumulated JSON files
        Merge(MergeArgs),
        /// Fetch finished games from BGA into a batch file
        Scrape(ScrapeArgs),
        /// Count card plays per player from the accumulated game logs
        Analyze(AnalyzeArgs),
    }

    #[derive(Debug, Clone, Default, Args)]
    pub struct MergeArgs {
        /// Merge games (default: <scraper_dir>/new_games.json)
        #[arg(short, long, num_args = 0..=1, default_missing_value = "")]
        pub games: Option<String>,

        /// Merge logs (default: <scraper_dir>/new_logs.json)
        #[arg(short, long, num_args = 0..=1, default_missing_value = "")]
        pub logs: Option<String>,

        /// Directory holding detailed_games.json and detailed_game_logs.json
        #[arg(long)]
        pub data_dir: Option<String>,

        #[arg(long, value_enum)]
        pub reset_policy: Option<ResetPolicy>,
    }

    impl MergeArgs {
        pub fn apply(&self, config: &mut TomlConfig) {
            if let Some(data_dir) = &self.data_dir {
                config.paths.data_dir = data_dir.clone();
            }
            if let Some(policy) = self.reset_policy {
                config.merge.reset_policy = policy;
            }
        }

        /// Neither flag means both kinds from their default batch files.
        pub fn jobs(&self, config: &TomlConfig) -> Vec<MergeJob> {
            let (games, logs) = match (&self.games, &self.logs) {
                (None, None) => (Some(String::new()), Some(String::new())),
                (games, logs) => (games.clone(), logs.clone()),
            };

            [(RecordKind::Games, games), (RecordKind::Logs, logs)]
                .into_iter()
                .filter_map(|(kind, batch)| {
                    let batch = batch?;
                    let mut job = MergeJob::with_defaults(
                        kind,
                        &config.paths.data_dir,
                        &config.paths.scraper_dir,
                    );
                    if !batch.is_empty() {
                        job.batch_path = batch;
                    }
                    Some(job)
                })
                .collect()
        }
    }

    #[derive(Debug, Clone, Default, Args)]
    pub struct ScrapeArgs {
        /// Path to cookies JSON exported from the browser
        #[arg(short = 'k', long)]
        pub cookies: Option<String>,

        /// Max games to fetch
        #[arg(short, long)]
        pub limit: Option<usize>,

        /// Only games of this BGA player id
        #[arg(short, long)]
        pub player: Option<String>,

        /// Also fetch per-table details
        #[arg(long)]
        pub details: bool,

        /// Pause between per-table requests
        #[arg(long)]
        pub delay_ms: Option<u64>,

        /// Output batch file (default: <scraper_dir>/new_games.json)
        #[arg(short, long)]
        pub output: Option<String>,
    }

    impl ScrapeArgs {
        pub fn apply(&self, config: &mut TomlConfig) {
            if let Some(cookies) = &self.cookies {
                config.scrape.cookies = Some(cookies.clone());
            }
            if let Some(limit) = self.limit {
                config.scrape.limit = limit;
            }
            if let Some(player) = &self.player {
                config.scrape.player_id = Some(player.clone());
            }
            if self.details {
                config.scrape.fetch_details = true;
            }
            if let Some(delay) = self.delay_ms {
                config.scrape.request_delay_ms = delay;
            }
        }

        pub fn output_path(&self, config: &TomlConfig) -> String {
            self.output.clone().unwrap_or_else(|| {
                Path::new(&config.paths.scraper_dir)
                    .join(RecordKind::Games.batch_file())
                    .to_string_lossy()
                    .into_owned()
            })
        }
    }

    #[derive(Debug, Clone, Default, Args)]
    pub struct AnalyzeArgs {
        /// Game logs collection (default: <data_dir>/detailed_game_logs.json)
        #[arg(long)]
        pub logs: Option<String>,

        /// JSON report (default: <data_dir>/card_analysis.json)
        #[arg(short, long)]
        pub output: Option<String>,

        /// Also write the ranking as CSV
        #[arg(long)]
        pub csv: Option<String>,

        /// Players to rank, comma separated (default: everyone)
        #[arg(long, value_delimiter = ',')]
        pub players: Vec<String>,

        #[arg(long)]
        pub min_plays: Option<u32>,

        #[arg(long)]
        pub top: Option<usize>,
    }

    impl AnalyzeArgs {
        pub fn apply(&self, config: &mut TomlConfig) {
            if !self.players.is_empty() {
                config.analysis.tracked_players = self.players.clone();
            }
            if let Some(min_plays) = self.min_plays {
                config.analysis.min_plays = min_plays;
            }
            if let Some(top) = self.top {
                config.analysis.top_n = top;
            }
        }

        pub fn logs_path(&self, config: &TomlConfig) -> String {
            self.logs
                .clone()
                .unwrap_or_else(|| config.logs_collection_path())
        }

        pub fn output_path(&self, config: &TomlConfig) -> String {
            self.output.clone().unwrap_or_else(|| {
                Path::new(&config.paths.data_dir)
                    .join("card_analysis.json")
                    .to_string_lossy()
                    .into_owned()
            })
        }
    }

}
