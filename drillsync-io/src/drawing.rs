use std::fs;
use std::path::Path;

use drillsync_core::document::Document;
use tracing::{debug, info};

use crate::{DocumentLoader, DocumentSaver, IoError};

/// 以 JSON 存储的图纸文件。
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDrawingFile;

impl JsonDrawingFile {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentLoader for JsonDrawingFile {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let document: Document =
            serde_json::from_str(&data).map_err(|source| IoError::InvalidDocument {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(
            path = %path.display(),
            entities = document.entities().count(),
            blocks = document.blocks().count(),
            "已读取图纸"
        );
        Ok(document)
    }
}

impl DocumentSaver for JsonDrawingFile {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let data =
            serde_json::to_string_pretty(document).map_err(|source| IoError::InvalidDocument {
                path: path.to_path_buf(),
                source,
            })?;
        fs::write(path, data).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "图纸已保存");
        Ok(())
    }
}
