use crate::core::workbook::{read_workbook, render_sheets, SheetData};
use crate::domain::model::{header_row, next_sequence_number, ContactRecord, SheetRow, StoredRow};
use crate::domain::ports::{ContactSink, Storage};
use crate::utils::error::{CardError, Result};
use async_trait::async_trait;

pub const DEFAULT_FILENAME: &str = "card contacts.xlsx";
pub const DEFAULT_SHEET_NAME: &str = "Business Cards";

/// Contact sink backed by one worksheet of an xlsx file.
///
/// Every append rewrites the whole workbook. Other worksheets are written
/// back with their values and formulas; cell styling is not carried over.
pub struct XlsxFileSink<S: Storage> {
    storage: S,
    filename: String,
    sheet_name: String,
}

impl<S: Storage> XlsxFileSink<S> {
    pub fn new(storage: S, filename: impl Into<String>, sheet_name: impl Into<String>) -> Self {
        Self {
            storage,
            filename: filename.into(),
            sheet_name: sheet_name.into(),
        }
    }

    /// 讀取現有活頁簿；檔案不存在時回傳空的工作表清單
    async fn load_sheets(&self) -> Result<Vec<SheetData>> {
        match self.storage.read_file(&self.filename).await {
            Ok(bytes) => read_workbook(&bytes).map_err(|e| {
                CardError::persistence(format!(
                    "{} is not a readable xlsx file: {}",
                    self.storage.describe(&self.filename),
                    e
                ))
            }),
            Err(CardError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(CardError::IoError(e)) => Err(CardError::persistence(format!(
                "could not read {}: {}",
                self.storage.describe(&self.filename),
                e
            ))),
            Err(e) => Err(e),
        }
    }

    async fn persist(&self, sheets: &[SheetData]) -> Result<()> {
        let bytes = render_sheets(sheets, &self.sheet_name)
            .map_err(|e| CardError::persistence(e.to_string()))?;

        match self.storage.write_file(&self.filename, &bytes).await {
            Ok(()) => Ok(()),
            Err(CardError::IoError(e)) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(CardError::SinkLocked {
                    path: self.storage.describe(&self.filename),
                })
            }
            Err(CardError::IoError(e)) => Err(CardError::persistence(format!(
                "could not write {}: {}",
                self.storage.describe(&self.filename),
                e
            ))),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<S: Storage> ContactSink for XlsxFileSink<S> {
    async fn append(&self, record: &ContactRecord) -> Result<u64> {
        let mut sheets = self.load_sheets().await?;

        let index = match sheets.iter().position(|sheet| sheet.name == self.sheet_name) {
            Some(index) => index,
            None => {
                tracing::info!(
                    "📄 Creating contact sheet '{}' in {}",
                    self.sheet_name,
                    self.storage.describe(&self.filename)
                );
                sheets.push(SheetData::new(self.sheet_name.as_str(), Vec::new()));
                sheets.len() - 1
            }
        };

        let rows = &mut sheets[index].rows;
        if rows.is_empty() {
            rows.push(header_row());
        }

        let sequence_number = next_sequence_number(rows.len());
        rows.push(StoredRow::new(sequence_number, record.clone()).to_cells());

        self.persist(&sheets).await?;
        Ok(sequence_number)
    }

    async fn read_all(&self) -> Result<Vec<SheetRow>> {
        Ok(self
            .load_sheets()
            .await?
            .into_iter()
            .find(|sheet| sheet.name == self.sheet_name)
            .map(|sheet| sheet.rows)
            .unwrap_or_default())
    }

    fn describe(&self) -> String {
        format!("xlsx file {}", self.storage.describe(&self.filename))
    }
}
