use crate::app::producers::bga::{ScrapeOptions, BGA_EN_BASE};
use crate::core::card_analysis::RankingOptions;
use crate::core::engine::ResetPolicy;
use crate::utils::error::{Result, StatsError};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_required_field, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "arknova-stats.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub paths: PathsConfig,
    pub scrape: ScrapeConfig,
    pub merge: MergeConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where the accumulated collections live.
    pub data_dir: String,
    /// Where scrapers drop `new_games.json` / `new_logs.json`.
    pub scraper_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: "docs/data".to_string(),
            scraper_dir: "scraper".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub base_url: String,
    pub cookies: Option<String>,
    pub limit: usize,
    pub player_id: Option<String>,
    pub timeout_seconds: u64,
    pub request_delay_ms: u64,
    pub fetch_details: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: BGA_EN_BASE.to_string(),
            cookies: None,
            limit: 100,
            player_id: None,
            timeout_seconds: 30,
            request_delay_ms: 500,
            fetch_details: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub reset_policy: ResetPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub tracked_players: Vec<String>,
    pub min_plays: u32,
    pub top_n: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            tracked_players: Vec::new(),
            min_plays: 2,
            top_n: 10,
        }
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(StatsError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Explicit path must exist; otherwise `arknova-stats.toml` is used when present.
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                tracing::debug!("Using {}", DEFAULT_CONFIG_FILE);
                Self::from_file(DEFAULT_CONFIG_FILE)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| StatsError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${BGA_COOKIES})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::{Captures, Regex};
        use std::sync::LazyLock;

        static ENV_VAR: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

        ENV_VAR
            .replace_all(content, |caps: &Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn scrape_options(&self) -> ScrapeOptions {
        ScrapeOptions {
            base_url: self.scrape.base_url.clone(),
            limit: self.scrape.limit,
            player_id: self.scrape.player_id.clone(),
            fetch_details: self.scrape.fetch_details,
            request_delay: Duration::from_millis(self.scrape.request_delay_ms),
            timeout: Duration::from_secs(self.scrape.timeout_seconds),
        }
    }

    /// Cookie export used by `scrape`; required only there.
    pub fn cookies_path(&self) -> Result<&str> {
        validate_required_field("scrape.cookies", &self.scrape.cookies).map(String::as_str)
    }

    pub fn ranking_options(&self) -> RankingOptions {
        RankingOptions {
            tracked_players: self.analysis.tracked_players.clone(),
            min_plays: self.analysis.min_plays,
            top_n: self.analysis.top_n,
        }
    }

    pub fn logs_collection_path(&self) -> String {
        Path::new(&self.paths.data_dir)
            .join(crate::domain::model::RecordKind::Logs.collection_file())
            .to_string_lossy()
            .into_owned()
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_path("paths.data_dir", &self.paths.data_dir)?;
        validate_path("paths.scraper_dir", &self.paths.scraper_dir)?;

        validate_url("scrape.base_url", &self.scrape.base_url)?;
        validate_positive_number("scrape.limit", self.scrape.limit, 1)?;
        validate_range("scrape.timeout_seconds", self.scrape.timeout_seconds, 1, 300)?;
        if let Some(cookies) = &self.scrape.cookies {
            validate_path("scrape.cookies", cookies)?;
        }
        if let Some(player_id) = &self.scrape.player_id {
            validate_non_empty_string("scrape.player_id", player_id)?;
        }

        validate_positive_number("analysis.top_n", self.analysis.top_n, 1)?;
        for player in &self.analysis.tracked_players {
            validate_non_empty_string("analysis.tracked_players", player)?;
        }

        Ok(())
    }
}
