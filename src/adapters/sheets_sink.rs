use crate::domain::model::{next_sequence_number, Cell, ContactRecord, SheetRow, StoredRow};
use crate::domain::ports::{AccessTokenProvider, ContactSink};
use crate::utils::error::{CardError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

pub const DEFAULT_SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_DRIVE_ENDPOINT: &str = "https://www.googleapis.com/drive/v3";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

/// Contact sink appending rows to a pre-provisioned Google Sheets worksheet.
///
/// The worksheet is expected to already carry the header row.
pub struct GoogleSheetsSink {
    client: Client,
    endpoint: String,
    spreadsheet_id: String,
    worksheet: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl GoogleSheetsSink {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        worksheet: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            spreadsheet_id: spreadsheet_id.into(),
            worksheet: worksheet.into(),
            tokens,
        }
    }

    /// `{endpoint}/spreadsheets/{id}/values/{range}{suffix}`
    fn values_url(&self, suffix: &str) -> Result<Url> {
        let range = format!("{}{}", a1_sheet_range(&self.worksheet), suffix);
        api_url(
            &self.endpoint,
            &["spreadsheets", self.spreadsheet_id.as_str(), "values", range.as_str()],
        )
    }
}

#[async_trait]
impl ContactSink for GoogleSheetsSink {
    async fn append(&self, record: &ContactRecord) -> Result<u64> {
        // 先讀取列數再附加，兩次往返並非原子操作（由 SerializedSink 保證單一寫入者）
        let existing = self.read_all().await?;
        let sequence_number = next_sequence_number(existing.len());

        let row: Vec<serde_json::Value> = StoredRow::new(sequence_number, record.clone())
            .to_cells()
            .iter()
            .map(Cell::to_json)
            .collect();

        let token = self.tokens.access_token().await?;
        let url = self.values_url(":append")?;

        tracing::debug!("Appending row #{} to spreadsheet {}", sequence_number, self.spreadsheet_id);

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&serde_json::json!({ "values": [row] }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CardError::persistence(format!(
                "Google Sheets append returned {}: {}",
                status, body
            )));
        }

        Ok(sequence_number)
    }

    async fn read_all(&self) -> Result<Vec<SheetRow>> {
        let token = self.tokens.access_token().await?;
        let url = self.values_url("")?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&[
                ("majorDimension", "ROWS"),
                ("valueRenderOption", "UNFORMATTED_VALUE"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CardError::sink_unavailable(format!(
                "Google Sheets returned {}: {}",
                status, body
            )));
        }

        let range: ValueRange = response.json().await?;
        Ok(range
            .values
            .iter()
            .map(|row| row.iter().map(Cell::from_json).collect())
            .collect())
    }

    fn describe(&self) -> String {
        format!(
            "Google Sheets {} ({})",
            self.spreadsheet_id, self.worksheet
        )
    }
}

/// Looks up a spreadsheet id by its exact file name through the Drive API.
pub async fn resolve_spreadsheet_id(
    client: &Client,
    drive_endpoint: &str,
    tokens: &dyn AccessTokenProvider,
    name: &str,
) -> Result<String> {
    let token = tokens.access_token().await?;
    let url = api_url(drive_endpoint, &["files"])?;
    let query = format!(
        "name = '{}' and mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false",
        name.replace('\\', "\\\\").replace('\'', "\\'")
    );

    let response = client
        .get(url)
        .bearer_auth(token)
        .query(&[("q", query.as_str()), ("fields", "files(id,name)")])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CardError::sink_unavailable(format!(
            "Google Drive lookup for '{}' returned {}: {}",
            name, status, body
        )));
    }

    let listing: DriveFileList = response.json().await?;
    listing
        .files
        .into_iter()
        .next()
        .map(|file| file.id)
        .ok_or_else(|| CardError::sink_unavailable(format!("No spreadsheet named '{}' is shared with the service account", name)))
}

fn api_url(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| CardError::ConfigError {
        message: format!("invalid API endpoint '{}': {}", base, e),
    })?;

    url.path_segments_mut()
        .map_err(|_| CardError::ConfigError {
            message: format!("API endpoint '{}' cannot carry a path", base),
        })?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

/// 工作表名稱一律加上單引號，避免 `Q1`、`FY24` 等名稱被當成儲存格位址
fn a1_sheet_range(worksheet: &str) -> String {
    format!("'{}'", worksheet.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a1_sheet_range_always_quotes() {
        assert_eq!(a1_sheet_range("Sheet1"), "'Sheet1'");
        assert_eq!(a1_sheet_range("Q1"), "'Q1'");
        assert_eq!(a1_sheet_range("FY24"), "'FY24'");
        assert_eq!(a1_sheet_range("Business Cards"), "'Business Cards'");
        assert_eq!(a1_sheet_range("Bob's"), "'Bob''s'");
    }

    #[test]
    fn test_api_url_joins_segments() {
        let url = api_url(
            "https://sheets.googleapis.com/v4/",
            &["spreadsheets", "abc", "values", "Sheet1:append"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/Sheet1:append"
        );
    }

    #[test]
    fn test_api_url_rejects_garbage() {
        assert!(api_url("not a url", &["files"]).is_err());
    }
}
