use card_scanner::app::server;
use card_scanner::utils::error::ErrorSeverity;
use card_scanner::utils::{logger, validation::Validate};
use card_scanner::{CardError, CliConfig};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting card-scanner backend");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 載入並驗證配置
    let config = match cli.load_service_config() {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");

    let service = match server::build_service(&config).await {
        Ok(service) => service,
        Err(e) => exit_with(&e),
    };

    if let Err(e) = server::serve(&config, service).await {
        exit_with(&e);
    }

    Ok(())
}

fn exit_with(e: &CardError) -> ! {
    tracing::error!(
        "❌ card-scanner failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
