use thiserror::Error;

#[derive(Error, Debug)]
pub enum CardError {
    #[error("{message}")]
    InvalidInput { message: String },

    #[error("{message}")]
    ExtractionFailed { message: String },

    #[error("{message}")]
    SinkUnavailable { message: String },

    #[error("Could not save to Excel. Please ensure the file is not open in another program on the server.")]
    SinkLocked { path: String },

    #[error("Could not persist contact: {message}")]
    PersistenceFailed { message: String },

    #[error("Could not export contacts: {message}")]
    ExportFailed { message: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Spreadsheet write error: {0}")]
    SpreadsheetWriteError(#[from] rust_xlsxwriter::XlsxError),

    #[error("Spreadsheet read error: {0}")]
    SpreadsheetReadError(#[from] calamine::XlsxError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Extraction,
    Storage,
    Export,
    Network,
    Configuration,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CardError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            message: message.into(),
        }
    }

    pub fn sink_unavailable(message: impl Into<String>) -> Self {
        Self::SinkUnavailable {
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::PersistenceFailed {
            message: message.into(),
        }
    }

    pub fn export(message: impl Into<String>) -> Self {
        Self::ExportFailed {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput { .. } => ErrorCategory::Input,
            Self::ExtractionFailed { .. } => ErrorCategory::Extraction,
            Self::SinkUnavailable { .. }
            | Self::SinkLocked { .. }
            | Self::PersistenceFailed { .. }
            | Self::SpreadsheetReadError(_) => ErrorCategory::Storage,
            Self::ExportFailed { .. } | Self::SpreadsheetWriteError(_) => ErrorCategory::Export,
            Self::Timeout { .. } | Self::ApiError(_) => ErrorCategory::Network,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) | Self::SerializationError(_) => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Low,
            ErrorCategory::Extraction | ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Storage | ErrorCategory::Export | ErrorCategory::Internal => {
                ErrorSeverity::High
            }
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// HTTP 狀態碼：呼叫端錯誤為 4xx，伺服器端錯誤為 5xx
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput { .. } => 400,
            Self::Timeout { .. } => 504,
            _ => 500,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ApiError(e) if e.is_timeout() => {
                "The upstream service took too long to respond.".to_string()
            }
            Self::ApiError(e) => format!("Could not reach an upstream service: {}", e),
            Self::IoError(e) => format!("File system error: {}", e),
            Self::SpreadsheetReadError(e) => format!("The spreadsheet could not be read: {}", e),
            Self::SpreadsheetWriteError(e) => {
                format!("The spreadsheet could not be written: {}", e)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "Attach at least the front image of the card.",
            Self::ExtractionFailed { .. } => {
                "Retake the photo with better lighting or check the model API key and quota."
            }
            Self::SinkUnavailable { .. } => {
                "Check the [sink] section and the spreadsheet credentials, then restart the server."
            }
            Self::SinkLocked { .. } => "Close the spreadsheet in other programs and save again.",
            Self::PersistenceFailed { .. } | Self::IoError(_) => {
                "Check that the sink location is writable and has free space."
            }
            Self::ExportFailed { .. }
            | Self::SpreadsheetWriteError(_)
            | Self::SpreadsheetReadError(_) => {
                "Inspect the stored spreadsheet; it may be corrupted or not an xlsx file."
            }
            Self::Timeout { .. } | Self::ApiError(_) => {
                "Check network connectivity or raise the configured timeout."
            }
            Self::SerializationError(_) => "Check that request bodies are valid JSON.",
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => {
                "Fix the configuration file or environment variables and restart."
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CardError>;
