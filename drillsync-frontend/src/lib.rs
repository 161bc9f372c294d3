pub mod cli;
pub mod errors;
pub mod loader;

use std::path::Path;

use drillsync_config::AppConfig;
use drillsync_engine::command::CommandRequest;
use errors::FrontendError;
use loader::Session;
use tracing::{info, warn};

/// 打开图纸并执行一条命令，返回命令是否成功。
pub fn run_cli(
    config: &AppConfig,
    drawing: &Path,
    command: &str,
    args: &[String],
) -> Result<bool, FrontendError> {
    let mut session = Session::open(drawing, config)?;
    let commands = cli::available_commands(&session, config);
    if !commands.iter().any(|name| *name == command) {
        warn!(command, "未知命令");
        eprintln!("未知命令: {command}");
        println!("支持的命令: {}", commands.join(", "));
        return Ok(false);
    }

    info!(command, drawing = %drawing.display(), "执行命令");
    let request = CommandRequest::new(command, args.iter().cloned());
    let response = cli::run_command(&mut session, config, &request)?;
    cli::print_response(&response);
    Ok(response.success)
}
