use crate::adapters::{openai, sheets_sink, xlsx_sink};
use crate::core::card_service::{DEFAULT_EXPORT_FILENAME, DEFAULT_EXPORT_SHEET};
use crate::utils::error::{CardError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

const MAX_TIMEOUT_SECONDS: u64 = 600;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub extraction: ExtractionConfig,
    pub sink: SinkConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: openai::DEFAULT_ENDPOINT.to_string(),
            model: openai::DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Local,
    GoogleSheets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub timeout_seconds: u64,
    pub local: LocalSinkConfig,
    pub google_sheets: Option<GoogleSheetsConfig>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Local,
            timeout_seconds: 30,
            local: LocalSinkConfig::default(),
            google_sheets: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSinkConfig {
    pub directory: String,
    pub filename: String,
    pub sheet_name: String,
}

impl Default for LocalSinkConfig {
    fn default() -> Self {
        Self {
            directory: ".".to_string(),
            filename: xlsx_sink::DEFAULT_FILENAME.to_string(),
            sheet_name: xlsx_sink::DEFAULT_SHEET_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleSheetsConfig {
    pub credentials_file: Option<String>,
    pub access_token: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub spreadsheet_name: Option<String>,
    #[serde(default = "default_worksheet")]
    pub worksheet: String,
    #[serde(default = "default_sheets_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_drive_endpoint")]
    pub drive_endpoint: String,
}

fn default_worksheet() -> String {
    "Sheet1".to_string()
}

fn default_sheets_endpoint() -> String {
    sheets_sink::DEFAULT_SHEETS_ENDPOINT.to_string()
}

fn default_drive_endpoint() -> String {
    sheets_sink::DEFAULT_DRIVE_ENDPOINT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub filename: String,
    pub sheet_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            filename: DEFAULT_EXPORT_FILENAME.to_string(),
            sheet_name: DEFAULT_EXPORT_SHEET.to_string(),
        }
    }
}

impl ServiceConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CardError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| CardError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OPENAI_API_KEY})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| CardError::ConfigError {
            message: format!("invalid placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 套用環境變數後備值：未設定 api_key 時讀取 OPENAI_API_KEY
    pub fn apply_env_fallbacks(&mut self) {
        if resolved(self.extraction.api_key.as_deref()).is_none() {
            self.extraction.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
    }

    /// The extraction credential, ignoring blanks and unresolved placeholders.
    pub fn api_key(&self) -> Option<&str> {
        resolved(self.extraction.api_key.as_deref())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("server.host", &self.server.host)?;

        validation::validate_url("extraction.endpoint", &self.extraction.endpoint)?;
        validation::validate_non_empty_string("extraction.model", &self.extraction.model)?;
        validation::validate_range(
            "extraction.timeout_seconds",
            self.extraction.timeout_seconds,
            1,
            MAX_TIMEOUT_SECONDS,
        )?;
        if self.api_key().is_none() {
            return Err(CardError::MissingConfigError {
                field: "extraction.api_key (or OPENAI_API_KEY)".to_string(),
            });
        }

        validation::validate_range(
            "sink.timeout_seconds",
            self.sink.timeout_seconds,
            1,
            MAX_TIMEOUT_SECONDS,
        )?;

        match self.sink.kind {
            SinkKind::Local => {
                validation::validate_path("sink.local.directory", &self.sink.local.directory)?;
                validation::validate_file_name(
                    "sink.local.filename",
                    &self.sink.local.filename,
                    "xlsx",
                )?;
                validate_sheet_name("sink.local.sheet_name", &self.sink.local.sheet_name)?;
            }
            SinkKind::GoogleSheets => {
                // 缺少 Google Sheets 設定不會中止程式，只會讓儲存路由回報無法使用
                if let Some(sheets) = &self.sink.google_sheets {
                    sheets.validate()?;
                }
            }
        }

        validation::validate_file_name("export.filename", &self.export.filename, "xlsx")?;
        validate_sheet_name("export.sheet_name", &self.export.sheet_name)?;

        Ok(())
    }
}

impl GoogleSheetsConfig {
    pub fn spreadsheet_id(&self) -> Option<&str> {
        resolved(self.spreadsheet_id.as_deref())
    }

    pub fn spreadsheet_name(&self) -> Option<&str> {
        resolved(self.spreadsheet_name.as_deref())
    }

    pub fn credentials_file(&self) -> Option<&str> {
        resolved(self.credentials_file.as_deref())
    }

    pub fn access_token(&self) -> Option<&str> {
        resolved(self.access_token.as_deref())
    }
}

impl Validate for GoogleSheetsConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("sink.google_sheets.endpoint", &self.endpoint)?;
        validation::validate_url("sink.google_sheets.drive_endpoint", &self.drive_endpoint)?;
        validation::validate_non_empty_string("sink.google_sheets.worksheet", &self.worksheet)?;

        if self.spreadsheet_id().is_some() && self.spreadsheet_name().is_some() {
            return Err(CardError::ConfigValidationError {
                field: "sink.google_sheets".to_string(),
                message: "set either spreadsheet_id or spreadsheet_name, not both".to_string(),
            });
        }

        Ok(())
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

fn resolved(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !(v.starts_with("${") && v.ends_with('}')))
}

/// Excel 工作表名稱限制：最多 31 字元，不可含 []:*?/\
fn validate_sheet_name(field_name: &str, name: &str) -> Result<()> {
    validation::validate_non_empty_string(field_name, name)?;

    if name.chars().count() > 31 || name.contains(['[', ']', ':', '*', '?', '/', '\\']) {
        return Err(CardError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "Worksheet names are limited to 31 characters without []:*?/\\".to_string(),
        });
    }

    Ok(())
}
