use crate::domain::model::{ContactRecord, SheetRow};
use crate::domain::ports::ContactSink;
use crate::utils::error::{CardError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Single-writer wrapper around a sink.
///
/// Appends are serialized so the read-count-then-append sequence of the
/// inner sink never interleaves inside one process. Reads share the same
/// lock so they never observe a half-written file.
///
/// Each append runs on its own task that owns the lock guard. A caller that
/// gives up (for example on timeout) leaves that task to finish, and the
/// next writer waits for it.
pub struct SerializedSink<S: ContactSink + 'static> {
    inner: Arc<S>,
    lock: Arc<Mutex<()>>,
}

impl<S: ContactSink + 'static> SerializedSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner: Arc::new(inner),
            lock: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl<S: ContactSink + 'static> ContactSink for SerializedSink<S> {
    async fn append(&self, record: &ContactRecord) -> Result<u64> {
        let guard = Arc::clone(&self.lock).lock_owned().await;
        let inner = Arc::clone(&self.inner);
        let record = record.clone();

        tokio::spawn(async move {
            let _guard = guard;
            inner.append(&record).await
        })
        .await
        .map_err(|e| CardError::persistence(format!("append task failed: {}", e)))?
    }

    async fn read_all(&self) -> Result<Vec<SheetRow>> {
        let _guard = self.lock.lock().await;
        self.inner.read_all().await
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}
