//! Content source and sink used by the file processor

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// Reads whole inputs and writes whole outputs
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn read_all(&self, input: &Path) -> Result<String>;
    async fn write(&self, output: &Path, text: &str) -> Result<()>;
}

/// Local filesystem store
#[derive(Debug, Clone, Copy, Default)]
pub struct FsContentStore;

#[async_trait]
impl ContentStore for FsContentStore {
    async fn read_all(&self, input: &Path) -> Result<String> {
        Ok(tokio::fs::read_to_string(input).await?)
    }

    async fn write(&self, output: &Path, text: &str) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(output, text).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn test_write_creates_parent_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.txt");

        FsContentStore.write(&path, "héllo").await.unwrap();
        assert_eq!(FsContentStore.read_all(&path).await.unwrap(), "héllo");
    }

    #[tokio::test]
    async fn test_read_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsContentStore
            .read_all(&dir.path().join("missing.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
