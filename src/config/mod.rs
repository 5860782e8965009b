pub mod toml_config;

use crate::utils::error::Result;
use clap::Parser;
use toml_config::ServiceConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "card-scanner")]
#[command(about = "Business card scanning backend: extract contacts with an AI model and store them in a spreadsheet")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "CARD_SCANNER_CONFIG")]
    pub config: Option<String>,

    /// Override the bind host
    #[arg(long)]
    pub host: Option<String>,

    /// Override the listening port
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

impl CliConfig {
    /// 載入配置：TOML 檔案（若有指定）→ 環境變數後備值 → 命令列覆蓋
    pub fn load_service_config(&self) -> Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_file(path)?,
            None => ServiceConfig::default(),
        };

        config.apply_env_fallbacks();

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }

        Ok(config)
    }
}
