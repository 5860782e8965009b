use crate::utils::error::{CardError, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// 試算表標題列，決定每一列的欄位順序
pub const SINK_HEADER: [&str; 9] = [
    "Sl. No.",
    "Organization",
    "Name",
    "Designation",
    "Contact Number",
    "Email",
    "Website",
    "Address",
    "Remarks",
];

/// Contact fields in header order (after `Sl. No.`).
pub const CONTACT_FIELDS: [&str; 8] = [
    "organization",
    "name",
    "designation",
    "contact",
    "email",
    "website",
    "address",
    "remarks",
];

/// A contact extracted from a business card.
///
/// Unknown keys are ignored on deserialization; absent keys and `null`
/// become empty strings. Scalars such as numbers are kept as their text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub organization: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub designation: String,
    #[serde(deserialize_with = "lenient_string")]
    pub contact: String,
    #[serde(deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(deserialize_with = "lenient_string")]
    pub website: String,
    #[serde(deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(deserialize_with = "lenient_string")]
    pub remarks: String,
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_text(&value))
}

fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        // 巢狀結構不屬於名片欄位，保留原始 JSON 文字
        other => other.to_string(),
    }
}

impl ContactRecord {
    /// Projects an arbitrary JSON object onto the fixed contact fields.
    ///
    /// Returns the record together with the keys that were dropped.
    pub fn from_json_object(
        object: &serde_json::Map<String, serde_json::Value>,
    ) -> (Self, Vec<String>) {
        let field = |key: &str| object.get(key).map(value_to_text).unwrap_or_default();

        let record = Self {
            organization: field("organization"),
            name: field("name"),
            designation: field("designation"),
            contact: field("contact"),
            email: field("email"),
            website: field("website"),
            address: field("address"),
            remarks: field("remarks"),
        };

        let dropped = object
            .keys()
            .filter(|key| !CONTACT_FIELDS.contains(&key.as_str()))
            .cloned()
            .collect();

        (record, dropped)
    }

    /// Field values in header column order.
    pub fn values(&self) -> [&str; 8] {
        [
            self.organization.as_str(),
            self.name.as_str(),
            self.designation.as_str(),
            self.contact.as_str(),
            self.email.as_str(),
            self.website.as_str(),
            self.address.as_str(),
            self.remarks.as_str(),
        ]
    }
}

/// One spreadsheet cell as stored by a sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(i64),
    Float(f64),
    Bool(bool),
    /// Excel 日期序號（1900 日期系統）
    DateTime(f64),
    Text(String),
    /// 公式與其快取結果，改寫檔案時原樣寫回
    Formula { expression: String, cached: Box<Cell> },
}

// "yyyy-mm-dd hh:mm:ss"
const DATETIME_DISPLAY_LEN: usize = 19;

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn display_len(&self) -> usize {
        match self {
            Cell::Number(n) => n.to_string().chars().count(),
            Cell::Float(f) => f.to_string().chars().count(),
            Cell::Bool(true) => 4,
            Cell::Bool(false) => 5,
            Cell::DateTime(_) => DATETIME_DISPLAY_LEN,
            Cell::Text(s) => s.chars().count(),
            Cell::Formula { cached, .. } => cached.display_len(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Number(n) => serde_json::Value::from(*n),
            Cell::Float(f) | Cell::DateTime(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Cell::Bool(b) => serde_json::Value::Bool(*b),
            Cell::Text(s) => serde_json::Value::from(s.as_str()),
            Cell::Formula { cached, .. } => cached.to_json(),
        }
    }

    /// 從試算表 API 回傳的 JSON 值轉成儲存格
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Number(i),
                None => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Cell::Number(f as i64)
                    }
                    Some(f) => Cell::Float(f),
                    None => Cell::Text(n.to_string()),
                },
            },
            serde_json::Value::Bool(b) => Cell::Bool(*b),
            other => Cell::Text(value_to_text(other)),
        }
    }
}

pub type SheetRow = Vec<Cell>;

/// A contact record prefixed with its assigned sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub sequence_number: u64,
    pub record: ContactRecord,
}

impl StoredRow {
    pub fn new(sequence_number: u64, record: ContactRecord) -> Self {
        Self {
            sequence_number,
            record,
        }
    }

    pub fn to_cells(&self) -> SheetRow {
        let mut cells = Vec::with_capacity(SINK_HEADER.len());
        cells.push(Cell::Number(self.sequence_number as i64));
        cells.extend(self.record.values().iter().map(|v| Cell::text(*v)));
        cells
    }
}

pub fn header_row() -> SheetRow {
    SINK_HEADER.iter().map(|h| Cell::text(*h)).collect()
}

/// Sequence number for the next row: existing data rows + 1.
///
/// `existing_rows` counts every row already in the sink, header included.
pub fn next_sequence_number(existing_rows: usize) -> u64 {
    existing_rows.saturating_sub(1) as u64 + 1
}

/// Front and optional back image references for one card.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardImages {
    pub front_image: Option<String>,
    pub back_image: Option<String>,
}

impl CardImages {
    pub fn new(front_image: impl Into<String>, back_image: Option<String>) -> Self {
        Self {
            front_image: Some(front_image.into()),
            back_image,
        }
    }

    /// 檢查正面圖片是否存在；空白的背面圖片視為未提供
    pub fn require_front(&self) -> Result<(&str, Option<&str>)> {
        let front = self
            .front_image
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CardError::invalid_input("Front image is required."))?;

        let back = self
            .back_image
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        Ok((front, back))
    }
}

/// An in-memory spreadsheet ready to download.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}
