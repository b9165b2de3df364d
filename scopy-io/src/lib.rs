use std::fs;
use std::path::{Path, PathBuf};

use scopy_core::memory::MemoryDocument;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure in {path:?}: {source}")]
    InvalidDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode document: {0}")]
    Encode(#[source] serde_json::Error),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<MemoryDocument, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &MemoryDocument, path: &Path) -> Result<(), IoError>;
}

/// 以 JSON 保存/读取内存文档。
#[derive(Debug, Clone, Copy)]
pub struct JsonFacade {
    pretty: bool,
}

impl Default for JsonFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonFacade {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// 输出紧凑格式，便于机器处理。
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl DocumentLoader for JsonFacade {
    fn load(&self, path: &Path) -> Result<MemoryDocument, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut document: MemoryDocument =
            serde_json::from_str(&data).map_err(|source| IoError::InvalidDocument {
                path: path.to_path_buf(),
                source,
            })?;
        document.normalize_ids();
        debug!(path = %path.display(), elements = document.element_count(), "已读取文档");
        Ok(document)
    }
}

impl DocumentSaver for JsonFacade {
    fn save(&self, document: &MemoryDocument, path: &Path) -> Result<(), IoError> {
        let encoded = if self.pretty {
            serde_json::to_string_pretty(document)
        } else {
            serde_json::to_string(document)
        }
        .map_err(IoError::Encode)?;
        fs::write(path, encoded).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "已写出文档");
        Ok(())
    }
}
