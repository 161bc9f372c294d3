pub mod converter;
pub mod drawing;
pub mod export;
pub mod report;
pub mod snapshot;

use std::path::{Path, PathBuf};

use drillsync_core::document::Document;
use thiserror::Error;

pub use converter::{CoordinateConverter, SubprocessError};
pub use drawing::JsonDrawingFile;
pub use snapshot::{JsonSnapshotStore, SnapshotError, snapshot_file_name};

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
    #[error("invalid document {path:?}: {source}")]
    InvalidDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write csv {path:?}: {source}")]
    CsvError {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// 图纸名称取文件名去掉扩展名的部分。
pub fn drawing_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawing_name_is_the_file_stem() {
        assert_eq!(
            drawing_name(Path::new("/jobs/PAD-12-LAYOUT-R05.json")),
            "PAD-12-LAYOUT-R05"
        );
        assert_eq!(drawing_name(Path::new("PAD")), "PAD");
        assert_eq!(drawing_name(Path::new("/")), "");
    }
}
