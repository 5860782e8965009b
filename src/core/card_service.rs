use crate::core::workbook::render_workbook;
use crate::domain::model::{CardImages, ContactRecord, ExportFile};
use crate::domain::ports::{CardExtractor, ContactSink};
use crate::utils::error::{CardError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_EXPORT_FILENAME: &str = "Business_Card_Contacts.xlsx";
pub const DEFAULT_EXPORT_SHEET: &str = "Business Cards";

#[derive(Debug, Clone)]
pub struct ServiceTimeouts {
    pub extraction: Duration,
    pub sink: Duration,
}

impl Default for ServiceTimeouts {
    fn default() -> Self {
        Self {
            extraction: Duration::from_secs(60),
            sink: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub filename: String,
    pub sheet_name: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            filename: DEFAULT_EXPORT_FILENAME.to_string(),
            sheet_name: DEFAULT_EXPORT_SHEET.to_string(),
        }
    }
}

/// The extract → save → export workflow, built once at startup.
///
/// `sink` is `None` when no storage backend could be established; the
/// extraction route keeps working and sink-backed operations fail with
/// `SinkUnavailable`.
pub struct ContactService {
    extractor: Arc<dyn CardExtractor>,
    sink: Option<Arc<dyn ContactSink>>,
    unavailable_reason: String,
    timeouts: ServiceTimeouts,
    export: ExportSettings,
}

impl ContactService {
    pub fn new(extractor: Arc<dyn CardExtractor>, sink: Option<Arc<dyn ContactSink>>) -> Self {
        Self {
            extractor,
            sink,
            unavailable_reason: "No contact storage is configured on the server.".to_string(),
            timeouts: ServiceTimeouts::default(),
            export: ExportSettings::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: ServiceTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_export(mut self, export: ExportSettings) -> Self {
        self.export = export;
        self
    }

    /// 記錄儲存後端無法使用的原因，回傳給呼叫端
    pub fn with_unavailable_reason(mut self, reason: impl Into<String>) -> Self {
        self.unavailable_reason = reason.into();
        self
    }

    pub fn sink_description(&self) -> Option<String> {
        self.sink.as_ref().map(|sink| sink.describe())
    }

    fn sink(&self) -> Result<&Arc<dyn ContactSink>> {
        self.sink
            .as_ref()
            .ok_or_else(|| CardError::sink_unavailable(self.unavailable_reason.clone()))
    }

    pub async fn process_card(&self, images: &CardImages) -> Result<ContactRecord> {
        // 缺少正面圖片時，不發出任何外部請求
        images.require_front()?;

        bounded(
            "Card extraction",
            self.timeouts.extraction,
            self.extractor.extract(images),
        )
        .await
    }

    pub async fn save_contact(&self, record: &ContactRecord) -> Result<u64> {
        let sink = self.sink()?;
        let sequence_number = bounded("Saving contact", self.timeouts.sink, sink.append(record)).await?;

        tracing::info!(
            "💾 Successfully saved contact #{} to {}",
            sequence_number,
            sink.describe()
        );
        Ok(sequence_number)
    }

    pub async fn export_all(&self) -> Result<ExportFile> {
        let sink = self.sink()?;
        let rows = bounded("Reading contacts", self.timeouts.sink, sink.read_all()).await?;

        let bytes = render_workbook(&self.export.sheet_name, &rows).map_err(|e| match e {
            CardError::ExportFailed { .. } => e,
            other => CardError::export(other.to_string()),
        })?;

        tracing::info!(
            "📦 Exported {} row(s) from {} as {}",
            rows.len(),
            sink.describe(),
            self.export.filename
        );

        Ok(ExportFile {
            filename: self.export.filename.clone(),
            bytes,
        })
    }
}

/// Runs `operation` under `limit`; transport timeouts surface the same way.
async fn bounded<T>(
    operation: &str,
    limit: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    let timeout_error = || CardError::Timeout {
        operation: operation.to_string(),
        seconds: limit.as_secs(),
    };

    match tokio::time::timeout(limit, future).await {
        Ok(Err(CardError::ApiError(e))) if e.is_timeout() => Err(timeout_error()),
        Ok(result) => result,
        Err(_) => Err(timeout_error()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::SheetRow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingExtractor {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingExtractor {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay,
            }
        }
    }

    #[async_trait]
    impl CardExtractor for CountingExtractor {
        async fn extract(&self, _images: &CardImages) -> Result<ContactRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(ContactRecord {
                name: "Jo".to_string(),
                ..Default::default()
            })
        }
    }

    struct FixedSink(Vec<SheetRow>);

    #[async_trait]
    impl ContactSink for FixedSink {
        async fn append(&self, _record: &ContactRecord) -> Result<u64> {
            Ok(self.0.len() as u64)
        }

        async fn read_all(&self) -> Result<Vec<SheetRow>> {
            Ok(self.0.clone())
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    #[tokio::test]
    async fn test_missing_front_image_makes_no_call() {
        let extractor = Arc::new(CountingExtractor::new(Duration::ZERO));
        let service = ContactService::new(extractor.clone(), None);

        let err = service
            .process_card(&CardImages::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CardError::InvalidInput { .. }));
        assert_eq!(err.to_string(), "Front image is required.");
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_slow_extraction_times_out() {
        let extractor = Arc::new(CountingExtractor::new(Duration::from_secs(5)));
        let service = ContactService::new(extractor, None).with_timeouts(ServiceTimeouts {
            extraction: Duration::from_millis(20),
            sink: Duration::from_secs(1),
        });

        let err = service
            .process_card(&CardImages::new("front", None))
            .await
            .unwrap_err();

        assert!(matches!(err, CardError::Timeout { .. }));
        assert_eq!(err.status_code(), 504);
    }

    #[tokio::test]
    async fn test_unconfigured_sink_is_unavailable() {
        let extractor = Arc::new(CountingExtractor::new(Duration::ZERO));
        let service = ContactService::new(extractor, None)
            .with_unavailable_reason("Google Sheets is not configured on the server.");

        let save = service.save_contact(&ContactRecord::default()).await;
        let export = service.export_all().await;

        match save {
            Err(CardError::SinkUnavailable { message }) => {
                assert_eq!(message, "Google Sheets is not configured on the server.")
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(export, Err(CardError::SinkUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_export_uses_configured_filename() {
        let extractor = Arc::new(CountingExtractor::new(Duration::ZERO));
        let sink: Arc<dyn ContactSink> = Arc::new(FixedSink(vec![crate::domain::model::header_row()]));
        let service = ContactService::new(extractor, Some(sink)).with_export(ExportSettings {
            filename: "cards.xlsx".to_string(),
            sheet_name: "Cards".to_string(),
        });

        let file = tokio_test::assert_ok!(service.export_all().await);
        assert_eq!(file.filename, "cards.xlsx");
        assert!(!file.bytes.is_empty());
    }
}
