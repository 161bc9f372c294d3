//! 调用外部坐标转换程序。

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("未配置坐标转换程序")]
    NotConfigured,
    #[error("无法启动 {executable:?}: {source}")]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("等待子进程失败: {0}")]
    Wait(#[source] std::io::Error),
    #[error("坐标转换超过 {0:?} 未完成，已终止")]
    Timeout(Duration),
    #[error("坐标转换异常退出: {0}")]
    Failed(ExitStatus),
    #[error("坐标转换未生成输出文件 {0:?}")]
    MissingOutput(PathBuf),
}

#[derive(Debug, Clone)]
pub struct CoordinateConverter {
    executable: Option<PathBuf>,
    leading_args: Vec<String>,
    timeout: Duration,
    output_file: String,
}

impl CoordinateConverter {
    pub fn new(executable: Option<PathBuf>, timeout: Duration, output_file: impl Into<String>) -> Self {
        Self {
            executable,
            leading_args: Vec::new(),
            timeout,
            output_file: output_file.into(),
        }
    }

    /// 放在 CSV 路径之前的固定参数，例如解释器脚本路径。
    pub fn with_leading_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// 以 `(csv 路径, 坐标系选项)` 调用转换程序，工作目录为 CSV 所在目录。
    ///
    /// 进程须在超时前以 0 退出并生成固定名称的输出文件；运行前删除旧的输出文件。
    pub fn convert(&self, csv_path: &Path, option: &str) -> Result<PathBuf, SubprocessError> {
        let executable = self.executable.as_ref().ok_or(SubprocessError::NotConfigured)?;
        let work_dir = csv_path.parent().unwrap_or_else(|| Path::new("."));
        let output = work_dir.join(&self.output_file);
        if output.exists() {
            if let Err(err) = fs::remove_file(&output) {
                warn!(path = %output.display(), error = %err, "无法删除旧的输出文件");
            }
        }

        info!(
            executable = %executable.display(),
            csv = %csv_path.display(),
            option,
            "启动坐标转换"
        );
        let mut child = Command::new(executable)
            .args(&self.leading_args)
            .arg(csv_path)
            .arg(option)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SubprocessError::Spawn {
                executable: executable.clone(),
                source,
            })?;

        let status = self.wait_with_timeout(&mut child).inspect_err(|err| {
            error!(error = %err, "坐标转换失败");
        })?;
        if !status.success() {
            error!(%status, "坐标转换异常退出");
            return Err(SubprocessError::Failed(status));
        }
        if !output.is_file() {
            error!(path = %output.display(), "坐标转换未生成输出文件");
            return Err(SubprocessError::MissingOutput(output));
        }
        info!(path = %output.display(), "坐标转换完成");
        Ok(output)
    }

    fn wait_with_timeout(&self, child: &mut Child) -> Result<ExitStatus, SubprocessError> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait().map_err(SubprocessError::Wait)? {
                debug!(elapsed = ?started.elapsed(), "子进程已退出");
                return Ok(status);
            }
            if started.elapsed() >= self.timeout {
                if let Err(err) = child.kill() {
                    warn!(error = %err, "终止子进程失败");
                }
                if let Err(err) = child.wait() {
                    warn!(error = %err, "回收子进程失败");
                }
                return Err(SubprocessError::Timeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_executable_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let csv = dir.path().join("grid_points.csv");
        let converter = CoordinateConverter::new(None, Duration::from_secs(1), "out.xlsx");
        assert!(matches!(
            converter.convert(&csv, "NAD83"),
            Err(SubprocessError::NotConfigured)
        ));

        let converter = CoordinateConverter::new(
            Some(dir.path().join("no-such-converter")),
            Duration::from_secs(1),
            "out.xlsx",
        );
        assert!(matches!(
            converter.convert(&csv, "NAD83"),
            Err(SubprocessError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    fn shell(body: &str, timeout: Duration) -> CoordinateConverter {
        CoordinateConverter::new(Some(PathBuf::from("/bin/sh")), timeout, "out.xlsx")
            .with_leading_args(["-c", body, "convert"])
    }

    #[cfg(unix)]
    #[test]
    fn successful_run_returns_output_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let csv = dir.path().join("grid_points.csv");
        fs::write(&csv, "label,x,y\n").expect("csv");
        let converter = shell("echo \"$2\" > out.xlsx", Duration::from_secs(10));
        let output = converter.convert(&csv, "NAD27").expect("convert");
        assert_eq!(output, dir.path().join("out.xlsx"));
        assert_eq!(fs::read_to_string(output).expect("read").trim(), "NAD27");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_and_missing_output_fail() {
        let dir = tempfile::tempdir().expect("tempdir");
        let csv = dir.path().join("grid_points.csv");

        let converter = shell("touch out.xlsx; exit 3", Duration::from_secs(10));
        assert!(matches!(
            converter.convert(&csv, "NAD83"),
            Err(SubprocessError::Failed(_))
        ));

        // 上一次留下的输出文件会在运行前删除，不能当作本次结果。
        let converter = shell("exit 0", Duration::from_secs(10));
        assert!(matches!(
            converter.convert(&csv, "NAD83"),
            Err(SubprocessError::MissingOutput(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn slow_converter_is_killed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let csv = dir.path().join("grid_points.csv");
        let converter = shell("sleep 5; touch out.xlsx", Duration::from_millis(200));
        let started = Instant::now();
        assert!(matches!(
            converter.convert(&csv, "NAD83"),
            Err(SubprocessError::Timeout(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(!dir.path().join("out.xlsx").exists());
    }
}
