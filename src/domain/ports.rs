use crate::domain::model::{CardImages, ContactRecord, SheetRow};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Byte-level file access used by file-backed sinks.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn describe(&self, path: &str) -> String;
}

/// 名片欄位擷取（外部多模態模型）
#[async_trait]
pub trait CardExtractor: Send + Sync {
    async fn extract(&self, images: &CardImages) -> Result<ContactRecord>;
}

/// Append-only contact store.
#[async_trait]
pub trait ContactSink: Send + Sync {
    /// Appends one contact and returns its assigned sequence number.
    async fn append(&self, record: &ContactRecord) -> Result<u64>;

    /// Every stored row, header included, in stored order.
    async fn read_all(&self) -> Result<Vec<SheetRow>>;

    fn describe(&self) -> String;
}

/// Bearer tokens for the remote spreadsheet API.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}
