//! HTTP surface: the routes the scanner frontend talks to.

use crate::core::card_service::ContactService;
use crate::core::workbook::XLSX_MIME;
use crate::domain::model::{CardImages, ContactRecord};
use crate::utils::error::CardError;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const LIVENESS_TEXT: &str = "Card Scanner Backend is live.";

/// Builds the router; permissive CORS when `cors` is set.
pub fn build_router(service: Arc<ContactService>, cors: bool) -> Router {
    let router = Router::new()
        .route("/", get(index))
        .route("/process-card", post(process_card))
        .route("/save-contact", post(save_contact))
        .route("/download-excel", get(download_excel))
        .with_state(service)
        .layer(TraceLayer::new_for_http());

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

impl IntoResponse for CardError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                "❌ Request failed: {} (Category: {:?}, Severity: {:?})",
                self,
                self.category(),
                self.severity()
            );
        } else {
            tracing::warn!("⚠️ Rejected request: {}", self);
        }

        (status, Json(json!({ "error": self.user_friendly_message() }))).into_response()
    }
}

// 請求本體不是 JSON 時也回傳 {"error": ...}
fn rejected_body(rejection: JsonRejection) -> CardError {
    CardError::invalid_input(format!("Invalid JSON body: {}", rejection.body_text()))
}

async fn index() -> &'static str {
    LIVENESS_TEXT
}

async fn process_card(
    State(service): State<Arc<ContactService>>,
    payload: Result<Json<CardImages>, JsonRejection>,
) -> Result<Json<serde_json::Value>, CardError> {
    let Json(images) = payload.map_err(rejected_body)?;
    let record = service.process_card(&images).await?;
    Ok(Json(json!({ "data": record })))
}

async fn save_contact(
    State(service): State<Arc<ContactService>>,
    payload: Result<Json<ContactRecord>, JsonRejection>,
) -> Result<Json<serde_json::Value>, CardError> {
    let Json(record) = payload.map_err(rejected_body)?;
    let sequence_number = service.save_contact(&record).await?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("Contact #{} saved.", sequence_number),
    })))
}

async fn download_excel(
    State(service): State<Arc<ContactService>>,
) -> Result<Response, CardError> {
    let file = service.export_all().await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file.filename))
        .map_err(|e| CardError::export(format!("invalid download filename: {}", e)))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(XLSX_MIME));
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    Ok((StatusCode::OK, headers, file.bytes).into_response())
}
