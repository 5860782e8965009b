pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{
    openai::OpenAiExtractor, sheets_sink::GoogleSheetsSink, storage::LocalStorage,
    xlsx_sink::XlsxFileSink,
};
pub use config::{toml_config::ServiceConfig, CliConfig};
pub use crate::core::{card_service::ContactService, serialized_sink::SerializedSink};
pub use utils::error::{CardError, Result};
