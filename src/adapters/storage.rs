use crate::domain::ports::Storage;
use crate::utils::error::{CardError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = tokio::fs::read(self.full_path(path)).await?;
        Ok(data)
    }

    /// 先寫入同目錄的暫存檔再改名覆蓋，避免中途失敗留下半份檔案
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);
        let parent = match full_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        tokio::fs::create_dir_all(&parent).await?;

        let data = data.to_vec();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut temp = tempfile::NamedTempFile::new_in(&parent)?;
            temp.write_all(&data)?;
            temp.as_file().sync_all()?;
            temp.persist(&full_path).map_err(|e| CardError::IoError(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| CardError::IoError(std::io::Error::other(e)))?
    }

    fn describe(&self, path: &str) -> String {
        self.full_path(path).display().to_string()
    }
}
