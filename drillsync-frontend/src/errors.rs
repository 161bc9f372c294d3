use std::path::PathBuf;

use drillsync_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("图纸文件不存在: {0:?}")]
    DrawingMissing(PathBuf),
    #[error("钻孔名称快照与图纸文件同名: {0:?}，请在图纸名称中保留至少三段连字符分隔的名称")]
    SnapshotCollision(PathBuf),
    #[error(transparent)]
    Io(#[from] IoError),
}
