//! 图纸旁的钻孔名称 JSON 快照。

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use drillsync_core::slots::{PersistedSnapshot, SLOT_COUNT, SlotTable, SnapshotStore};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("写入快照 {path:?} 失败: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("序列化快照失败: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 取图纸名称的前两个连字符段作为快照文件名，不足两段时使用完整名称。
pub fn snapshot_file_name(drawing_name: &str) -> String {
    let segments: Vec<&str> = drawing_name.split('-').collect();
    let stem = if segments.len() >= 2 {
        format!("{}-{}", segments[0], segments[1])
    } else {
        drawing_name.to_string()
    };
    format!("{stem}.json")
}

#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 快照放在图纸文件所在目录。
    pub fn beside(drawing_path: &Path, drawing_name: &str) -> Self {
        let dir = drawing_path.parent().unwrap_or_else(|| Path::new(""));
        Self::new(dir.join(snapshot_file_name(drawing_name)))
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取快照。文件缺失或内容损坏时回退到默认值并立即写回；名称不足 12 个时按槽位补齐。
    pub fn load_or_init(&self, default_option: &str) -> PersistedSnapshot {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "快照不存在，使用默认值创建");
                return self.init_defaults(default_option);
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "读取快照失败，使用默认值");
                return Self::defaults(default_option);
            }
        };

        match serde_json::from_str::<PersistedSnapshot>(&raw) {
            Ok(snapshot) => {
                let padded = snapshot.drill_names.len() < SLOT_COUNT;
                let selected_option = if snapshot.selected_option.trim().is_empty() {
                    default_option.to_string()
                } else {
                    snapshot.selected_option.clone()
                };
                let snapshot = PersistedSnapshot::from_table(&snapshot.to_table(), selected_option);
                if padded {
                    debug!(path = %self.path.display(), "快照名称不足，已按槽位补齐");
                }
                snapshot
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "快照格式错误，使用默认值");
                self.init_defaults(default_option)
            }
        }
    }

    fn defaults(default_option: &str) -> PersistedSnapshot {
        PersistedSnapshot::from_table(&SlotTable::new(), default_option)
    }

    fn init_defaults(&self, default_option: &str) -> PersistedSnapshot {
        let snapshot = Self::defaults(default_option);
        if let Err(err) = self.save(&snapshot) {
            error!(path = %self.path.display(), error = %err, "写入默认快照失败");
        }
        snapshot
    }
}

impl SnapshotStore for JsonSnapshotStore {
    type Error = SnapshotError;

    fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), SnapshotError> {
        let data = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, data).map_err(|source| SnapshotError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "快照已保存");
        Ok(())
    }
}
