use std::path::Path;

use drillsync_engine::grid::GridPoint;
use tracing::info;

use crate::IoError;

/// 按 `label,x,y` 写出网格点，首行为列名。
pub fn write_grid_csv(points: &[GridPoint], path: &Path) -> Result<(), IoError> {
    let csv_error = |source: csv::Error| IoError::CsvError {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    writer.write_record(["label", "x", "y"]).map_err(csv_error)?;
    for point in points {
        writer
            .write_record([
                point.label.clone(),
                format!("{:.4}", point.position.x()),
                format!("{:.4}", point.position.y()),
            ])
            .map_err(csv_error)?;
    }
    writer.flush().map_err(|source| IoError::WriteError {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), count = points.len(), "网格点已导出");
    Ok(())
}
