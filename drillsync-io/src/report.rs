use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use drillsync_engine::check::CheckReport;
use tracing::info;

use crate::IoError;

pub fn report_file_name(drawing_name: &str) -> String {
    format!("{drawing_name}_CheckReport.txt")
}

/// 生成核对报告正文：表头、逐槽位结果与汇总行。
pub fn render_check_report(report: &CheckReport, generated_at: DateTime<Local>) -> String {
    let revision = report
        .revision
        .map(|revision| revision.to_string())
        .unwrap_or_else(|| "未识别".to_string());
    let mut lines = vec![
        "钻孔名称核对报告".to_string(),
        format!("图纸: {}", report.drawing_name),
        format!("版次: {revision}"),
        format!("时间: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
        String::new(),
    ];
    lines.extend(report.lines.iter().map(ToString::to_string));
    lines.push(String::new());
    lines.push(format!(
        "合计: {} 通过, {} 不一致",
        report.passed(),
        report.failed()
    ));
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// 把报告写入 `dir` 下的 `{图纸名}_CheckReport.txt`，返回文件路径。
pub fn write_check_report(report: &CheckReport, dir: &Path) -> Result<PathBuf, IoError> {
    let path = dir.join(report_file_name(&report.drawing_name));
    fs::write(&path, render_check_report(report, Local::now())).map_err(|source| {
        IoError::WriteError {
            path: path.clone(),
            source,
        }
    })?;
    info!(path = %path.display(), failed = report.failed(), "核对报告已写入");
    Ok(path)
}
