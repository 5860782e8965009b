// Adapters layer: concrete implementations for external systems (model API, storage backends).

pub mod google_auth;
pub mod openai;
pub mod sheets_sink;
pub mod storage;
pub mod xlsx_sink;
