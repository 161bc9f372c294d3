use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub offsets: OffsetConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `DRILLSYNC_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("DRILLSYNC_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// 快照缺失时写入的下拉框初值，同时作为坐标转换的分类参数。
    #[serde(default = "SyncConfig::default_option")]
    pub default_option: String,
}

impl SyncConfig {
    fn default_option() -> String {
        "NAD83".to_string()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_option: Self::default_option(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OffsetConfig {
    #[serde(default = "OffsetConfig::default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "OffsetConfig::default_table_name")]
    pub table_name: String,
}

impl OffsetConfig {
    fn default_tolerance() -> f64 {
        1.0
    }

    fn default_table_name() -> String {
        "OFFSETS".to_string()
    }
}

impl Default for OffsetConfig {
    fn default() -> Self {
        Self {
            tolerance: Self::default_tolerance(),
            table_name: Self::default_table_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    #[serde(default = "GridConfig::default_tag")]
    pub tag: String,
    #[serde(default = "GridConfig::default_csv_file")]
    pub csv_file: String,
}

impl GridConfig {
    fn default_tag() -> String {
        "GRID".to_string()
    }

    fn default_csv_file() -> String {
        "grid_points.csv".to_string()
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            tag: Self::default_tag(),
            csv_file: Self::default_csv_file(),
        }
    }
}

/// 外部坐标转换程序的调用参数。
#[derive(Debug, Clone, Deserialize)]
pub struct ConverterConfig {
    #[serde(default)]
    pub executable: Option<PathBuf>,
    /// 放在 CSV 路径之前的固定参数。
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "ConverterConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "ConverterConfig::default_output_file")]
    pub output_file: String,
}

impl ConverterConfig {
    fn default_timeout_secs() -> u64 {
        60
    }

    fn default_output_file() -> String {
        "converted_coordinates.xlsx".to_string()
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            executable: None,
            args: Vec::new(),
            timeout_secs: Self::default_timeout_secs(),
            output_file: Self::default_output_file(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
