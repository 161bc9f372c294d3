use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use drillsync_config::{AppConfig, ConfigError};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// 管理图纸中的钻孔名称属性。
#[derive(Parser)]
#[command(name = "drillsync", version)]
struct Cli {
    /// 配置文件路径，缺省时读取 `DRILLSYNC_CONFIG` 或 `./config/default.toml`。
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 覆盖配置中的日志等级。
    #[arg(long = "log-level", value_name = "LEVEL")]
    log_level: Option<String>,

    /// JSON 图纸文件。
    #[arg(value_name = "DRAWING")]
    drawing: PathBuf,

    /// 命令名称，例如 set、swap、check、export_grid。
    #[arg(value_name = "COMMAND", default_value = "show")]
    command: String,

    /// 命令参数。
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut config = load_configuration(cli.config);
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config);
    info!("启动 drillsync");

    match drillsync_frontend::run_cli(&config, &cli.drawing, &cli.command, &cli.args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            error!(error = %err, "执行命令失败");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_arguments_are_collected() {
        let cli = Cli::parse_from(["drillsync", "PAD-1.json", "set", "3", "-12.5", "W5"]);
        assert_eq!(cli.drawing, PathBuf::from("PAD-1.json"));
        assert_eq!(cli.command, "set");
        assert_eq!(cli.args, vec!["3", "-12.5", "W5"]);
    }

    #[test]
    fn command_defaults_to_show() {
        let cli = Cli::parse_from(["drillsync", "--log-level", "debug", "PAD-1.json"]);
        assert_eq!(cli.command, "show");
        assert!(cli.args.is_empty());
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}
