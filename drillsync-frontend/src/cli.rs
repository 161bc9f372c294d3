use std::path::PathBuf;

use drillsync_config::AppConfig;
use drillsync_core::slots::SnapshotStore;
use drillsync_engine::check::CheckReport;
use drillsync_engine::command::{
    CommandBus, CommandContext, CommandHandler, CommandRequest, CommandResponse,
};
use drillsync_engine::graph::DrawingHost;
use drillsync_engine::grid::collect_grid_points;
use drillsync_engine::offset::OffsetSettings;
use drillsync_io::JsonSnapshotStore;
use drillsync_io::converter::{CoordinateConverter, SubprocessError};
use drillsync_io::export::write_grid_csv;
use drillsync_io::report::write_check_report;
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::Session;

/// 生成核对报告并写入 `dir`。
struct CheckCommand {
    dir: PathBuf,
}

impl<S: SnapshotStore> CommandHandler<S> for CheckCommand {
    fn name(&self) -> &'static str {
        "check"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_, S>,
    ) -> CommandResponse {
        let report = CheckReport::run(
            &*context.drawing,
            context.drawing.drawing_name(),
            context.engine.table(),
        );
        match write_check_report(&report, &self.dir) {
            Ok(path) => {
                let mut lines: Vec<String> = report.lines.iter().map(ToString::to_string).collect();
                lines.push(format!(
                    "{} 通过, {} 不一致，报告: {}",
                    report.passed(),
                    report.failed(),
                    path.display()
                ));
                CommandResponse {
                    success: report.is_clean(),
                    message: Some(lines.join("\n")),
                }
            }
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

/// 导出网格点 CSV，再交给外部程序做坐标转换。
struct ExportGridCommand {
    tag: String,
    csv_path: PathBuf,
    converter: CoordinateConverter,
}

impl<S: SnapshotStore> CommandHandler<S> for ExportGridCommand {
    fn name(&self) -> &'static str {
        "export_grid"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_, S>,
    ) -> CommandResponse {
        let points = collect_grid_points(&*context.drawing, &self.tag);
        if points.is_empty() {
            return CommandResponse::err(format!("图纸中没有带 {} 属性的网格点", self.tag));
        }
        if let Err(err) = write_grid_csv(&points, &self.csv_path) {
            return CommandResponse::err(err.to_string());
        }
        match self
            .converter
            .convert(&self.csv_path, context.engine.selected_option())
        {
            Ok(output) => CommandResponse::ok(format!(
                "已导出 {} 个网格点，转换结果: {}",
                points.len(),
                output.display()
            )),
            Err(SubprocessError::NotConfigured) => CommandResponse::ok(format!(
                "已导出 {} 个网格点到 {}，未配置坐标转换程序",
                points.len(),
                self.csv_path.display()
            )),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

/// 构建命令总线，并注册依赖文件输出的命令。
pub fn build_bus(session: &Session, config: &AppConfig) -> CommandBus<JsonSnapshotStore> {
    let dir = session.output_dir().to_path_buf();
    let mut bus = CommandBus::new();
    bus.register(CheckCommand { dir: dir.clone() });
    bus.register(ExportGridCommand {
        tag: config.grid.tag.clone(),
        csv_path: dir.join(&config.grid.csv_file),
        converter: CoordinateConverter::new(
            config.converter.executable.clone(),
            config.converter.timeout(),
            config.converter.output_file.clone(),
        )
        .with_leading_args(config.converter.args.iter().cloned()),
    });
    bus
}

/// 在一份图纸上执行单条命令；成功且图纸有修改时写回图纸文件。
pub fn run_command(
    session: &mut Session,
    config: &AppConfig,
    request: &CommandRequest,
) -> Result<CommandResponse, FrontendError> {
    let bus = build_bus(session, config);
    let mut context = CommandContext {
        drawing: &mut session.drawing,
        engine: &mut session.engine,
        offsets: OffsetSettings {
            table_name: config.offsets.table_name.clone(),
            tolerance: config.offsets.tolerance,
        },
    };
    let response = bus.dispatch(request, &mut context);
    if response.success {
        info!(command = %request.name, "命令执行成功");
    } else {
        warn!(command = %request.name, message = ?response.message, "命令执行失败");
    }
    if session.save_if_modified()? {
        info!(path = %session.path.display(), "图纸已更新");
    }
    Ok(response)
}

/// 打印命令结果，失败时输出到标准错误。
pub fn print_response(response: &CommandResponse) {
    let message = response.message.as_deref().unwrap_or_default();
    if response.success {
        println!("{message}");
    } else {
        eprintln!("[失败] {message}");
    }
}

pub fn available_commands(session: &Session, config: &AppConfig) -> Vec<&'static str> {
    let bus = build_bus(session, config);
    let mut names: Vec<&'static str> = bus.available_commands().copied().collect();
    names.sort_unstable();
    names
}
