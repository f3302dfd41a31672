use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Malformed input in {source_name}: {message}")]
    MalformedInput { source_name: String, message: String },

    #[error("Collection file not found: {path}")]
    MissingCollection { path: String },

    #[error("Authentication failed: {message}")]
    AuthenticationError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Setup,
    Network,
    Authentication,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl StatsError {
    pub fn malformed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedInput { .. } | Self::SerializationError(_) | Self::CsvError(_) => {
                ErrorCategory::Input
            }
            Self::MissingCollection { .. } => ErrorCategory::Setup,
            Self::ApiError(_) => ErrorCategory::Network,
            Self::AuthenticationError { .. } => ErrorCategory::Authentication,
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Input
            | ErrorCategory::Setup
            | ErrorCategory::Authentication
            | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::MalformedInput { source_name, .. } => format!(
                "Check that {} is valid JSON and every record has a non-empty tableId",
                source_name
            ),
            Self::SerializationError(_) => {
                "Check that the input files contain valid JSON".to_string()
            }
            Self::CsvError(_) => "Check that the CSV output path is writable".to_string(),
            Self::MissingCollection { path } => format!(
                "Create {} first, e.g. with {{\"exportedAt\": \"\", \"totalGames\": 0, \"games\": []}}",
                path
            ),
            Self::ApiError(_) => {
                "Check your network connection and re-run; no collection data was changed"
                    .to_string()
            }
            Self::AuthenticationError { .. } => "Log into boardgamearena.com in your browser, \
                 export cookies with the Cookie-Editor extension as JSON, \
                 save them to cookies.json and re-run with --cookies cookies.json"
                .to_string(),
            Self::MissingConfigError { field } if field == "scrape.cookies" => {
                "Pass the exported cookies file with --cookies cookies.json \
                 or set cookies under [scrape] in arknova-stats.toml"
                    .to_string()
            }
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => {
                "Review the configuration file and command line flags".to_string()
            }
            Self::IoError(_) => "Check file permissions and available disk space".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Input => format!("Input data is malformed: {}", self),
            ErrorCategory::Setup => format!("Setup incomplete: {}", self),
            ErrorCategory::Network => format!("Could not reach Board Game Arena: {}", self),
            ErrorCategory::Authentication => format!("Not logged in to Board Game Arena: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, StatsError>;
