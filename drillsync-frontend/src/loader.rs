use std::path::{Path, PathBuf};

use drillsync_config::AppConfig;
use drillsync_engine::host::Drawing;
use drillsync_engine::sync::AttributeSyncEngine;
use drillsync_io::{DocumentLoader, DocumentSaver, JsonDrawingFile, JsonSnapshotStore, drawing_name};
use tracing::{info, warn};

use crate::errors::FrontendError;

/// 打开的图纸及其钻孔名称引擎。
pub struct Session {
    pub path: PathBuf,
    pub drawing: Drawing,
    pub engine: AttributeSyncEngine<JsonSnapshotStore>,
}

impl Session {
    /// 读取图纸与旁边的快照；快照缺失或损坏时按配置的默认选项初始化。
    /// 快照文件名与图纸文件相同时拒绝打开，避免图纸被快照覆盖。
    pub fn open(path: &Path, config: &AppConfig) -> Result<Self, FrontendError> {
        if !path.is_file() {
            return Err(FrontendError::DrawingMissing(path.to_path_buf()));
        }
        let name = drawing_name(path);
        let store = JsonSnapshotStore::beside(path, &name);
        if store.path() == path {
            warn!(path = %path.display(), "快照路径与图纸文件相同，拒绝打开");
            return Err(FrontendError::SnapshotCollision(path.to_path_buf()));
        }
        let document = JsonDrawingFile::new().load(path)?;
        let snapshot = store.load_or_init(&config.sync.default_option);
        info!(
            drawing = %name,
            snapshot = %store.path().display(),
            option = %snapshot.selected_option,
            "已打开图纸"
        );
        Ok(Self {
            path: path.to_path_buf(),
            drawing: Drawing::new(name, document),
            engine: AttributeSyncEngine::from_snapshot(&snapshot, store),
        })
    }

    /// 图纸有提交过的修改时写回文件，返回是否写入。
    pub fn save_if_modified(&self) -> Result<bool, FrontendError> {
        if self.drawing.commit_count() == 0 {
            return Ok(false);
        }
        JsonDrawingFile::new().save(self.drawing.document(), &self.path)?;
        Ok(true)
    }

    /// 报告与导出文件放在图纸所在目录。
    pub fn output_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

#[cfg(test)]
mod tests {
    use drillsync_core::document::Document;
    use drillsync_core::geometry::Point2;

    use super::*;

    #[test]
    fn missing_drawing_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = Session::open(&dir.path().join("nope.json"), &AppConfig::default());
        assert!(matches!(result, Err(FrontendError::DrawingMissing(_))));
    }

    #[test]
    fn drawing_named_like_its_snapshot_is_left_intact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = JsonDrawingFile::new();
        let mut document = Document::new();
        document.add_text(Point2::default(), "DRILL_1", 2.5, 0.0, "NOTES");
        for name in ["PAD-5.json", "PAD.json"] {
            let path = dir.path().join(name);
            file.save(&document, &path).expect("save");
            let before = std::fs::read_to_string(&path).expect("read");

            let result = Session::open(&path, &AppConfig::default());
            assert!(matches!(result, Err(FrontendError::SnapshotCollision(_))));
            assert_eq!(std::fs::read_to_string(&path).expect("read"), before);
            assert!(file.load(&path).is_ok());
        }
    }

    #[test]
    fn opening_creates_the_snapshot_with_configured_option() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("PAD-4-SITE.json");
        JsonDrawingFile::new()
            .save(&Document::new(), &path)
            .expect("save");
        let mut config = AppConfig::default();
        config.sync.default_option = "UTM12".to_string();

        let Ok(session) = Session::open(&path, &config) else {
            panic!("session should open");
        };
        assert_eq!(session.engine.selected_option(), "UTM12");
        assert!(dir.path().join("PAD-4.json").is_file());
        assert!(!session.save_if_modified().expect("save"));
        assert_eq!(session.output_dir(), dir.path());
    }
}
