use crate::adapters::google_auth::StaticTokenProvider;
use crate::adapters::sheets_sink::{resolve_spreadsheet_id, GoogleSheetsSink};
use crate::adapters::storage::LocalStorage;
use crate::adapters::{openai::OpenAiExtractor, xlsx_sink::XlsxFileSink};
use crate::app::http::build_router;
use crate::config::toml_config::{GoogleSheetsConfig, ServiceConfig, SinkKind};
use crate::core::card_service::{ContactService, ExportSettings, ServiceTimeouts};
use crate::core::serialized_sink::SerializedSink;
use crate::domain::ports::{AccessTokenProvider, ContactSink};
use crate::utils::error::{CardError, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const SHEETS_NOT_CONFIGURED: &str = "Google Sheets is not configured on the server.";

fn http_client(timeout_seconds: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()?)
}

/// Builds the service once at startup.
///
/// A missing extraction credential is fatal. A storage backend that cannot
/// be established only disables the sink-backed routes.
pub async fn build_service(config: &ServiceConfig) -> Result<ContactService> {
    let api_key = config
        .api_key()
        .ok_or_else(|| CardError::MissingConfigError {
            field: "extraction.api_key (or OPENAI_API_KEY)".to_string(),
        })?;

    let extractor = OpenAiExtractor::new(
        http_client(config.extraction.timeout_seconds)?,
        &config.extraction.endpoint,
        &config.extraction.model,
        api_key,
    );

    let (sink, unavailable_reason) = match build_sink(config).await {
        Ok(sink) => {
            tracing::info!("🗂️ Contacts will be stored in {}", sink.describe());
            (Some(sink), None)
        }
        Err(e) => {
            tracing::warn!("⚠️ Contact storage unavailable, only extraction is served: {}", e);
            (None, Some(e.user_friendly_message()))
        }
    };

    let mut service = ContactService::new(Arc::new(extractor), sink)
        .with_timeouts(ServiceTimeouts {
            extraction: Duration::from_secs(config.extraction.timeout_seconds),
            sink: Duration::from_secs(config.sink.timeout_seconds),
        })
        .with_export(ExportSettings {
            filename: config.export.filename.clone(),
            sheet_name: config.export.sheet_name.clone(),
        });

    if let Some(reason) = unavailable_reason {
        service = service.with_unavailable_reason(reason);
    }

    Ok(service)
}

async fn build_sink(config: &ServiceConfig) -> Result<Arc<dyn ContactSink>> {
    match config.sink.kind {
        SinkKind::Local => {
            let local = &config.sink.local;
            let sink = XlsxFileSink::new(
                LocalStorage::new(&local.directory),
                &local.filename,
                &local.sheet_name,
            );
            Ok(Arc::new(SerializedSink::new(sink)))
        }
        SinkKind::GoogleSheets => {
            let sheets = config
                .sink
                .google_sheets
                .as_ref()
                .ok_or_else(|| CardError::sink_unavailable(SHEETS_NOT_CONFIGURED))?;
            let sink = build_sheets_sink(sheets, config.sink.timeout_seconds).await?;
            Ok(Arc::new(SerializedSink::new(sink)))
        }
    }
}

async fn build_sheets_sink(
    config: &GoogleSheetsConfig,
    timeout_seconds: u64,
) -> Result<GoogleSheetsSink> {
    let client = http_client(timeout_seconds)?;
    let tokens = token_provider(config)?;

    let spreadsheet_id = match (config.spreadsheet_id(), config.spreadsheet_name()) {
        (Some(id), _) => id.to_string(),
        (None, Some(name)) => {
            let id =
                resolve_spreadsheet_id(&client, &config.drive_endpoint, tokens.as_ref(), name)
                    .await?;
            tracing::info!("🔎 Resolved spreadsheet '{}' to {}", name, id);
            id
        }
        (None, None) => {
            return Err(CardError::sink_unavailable(
                "Google Sheets needs spreadsheet_id or spreadsheet_name.",
            ))
        }
    };

    Ok(GoogleSheetsSink::new(
        client,
        &config.endpoint,
        spreadsheet_id,
        &config.worksheet,
        tokens,
    ))
}

fn token_provider(config: &GoogleSheetsConfig) -> Result<Arc<dyn AccessTokenProvider>> {
    if let Some(token) = config.access_token() {
        return Ok(Arc::new(StaticTokenProvider::new(token)));
    }

    let Some(path) = config.credentials_file() else {
        return Err(CardError::sink_unavailable(SHEETS_NOT_CONFIGURED));
    };

    #[cfg(feature = "google-sheets")]
    return crate::adapters::google_auth::ServiceAccountTokenProvider::from_file(path)
        .map(|provider| Arc::new(provider) as Arc<dyn AccessTokenProvider>);

    #[cfg(not(feature = "google-sheets"))]
    return Err(CardError::sink_unavailable(format!(
        "Cannot use credentials file {}: built without the google-sheets feature.",
        path
    )));
}

/// Serves the HTTP surface until Ctrl-C.
pub async fn serve(config: &ServiceConfig, service: ContactService) -> Result<()> {
    let app = build_router(Arc::new(service), config.server.cors);
    let addr = config.bind_address();

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Card scanner listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
