use std::collections::HashMap;

use drillsync_core::document::EntityId;
use drillsync_core::slots::{SlotIndex, SnapshotStore};

use crate::errors::SyncError;
use crate::host::{Drawing, NodeHandle};
use crate::offset::{OffsetReport, OffsetSettings, apply_offsets};
use crate::sync::AttributeSyncEngine;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// `NoOp` 作为成功的提示返回，其余错误视为失败。
    pub fn from_result(result: Result<String, SyncError>) -> Self {
        match result {
            Ok(message) => Self::ok(message),
            Err(err) if !err.is_failure() => Self::ok(err.to_string()),
            Err(err) => Self::err(err.to_string()),
        }
    }
}

pub trait CommandHandler<S: SnapshotStore>: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_, S>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a, S: SnapshotStore> {
    pub drawing: &'a mut Drawing,
    pub engine: &'a mut AttributeSyncEngine<S>,
    pub offsets: OffsetSettings,
}

pub struct CommandBus<S: SnapshotStore> {
    handlers: HashMap<&'static str, Box<dyn CommandHandler<S>>>,
}

impl<S: SnapshotStore> CommandBus<S> {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(SetCommand);
        bus.register(ResetCommand);
        bus.register(SwapCommand);
        bus.register(SetAllCommand);
        bus.register(ResetAllCommand);
        bus.register(UpdateFromSelectionCommand);
        bus.register(SelectOptionCommand);
        bus.register(ShowCommand);
        bus.register(MatchOffsetsCommand);
        bus
    }

    pub fn register<H: CommandHandler<S> + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_, S>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

impl<S: SnapshotStore> Default for CommandBus<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// 接受 `3` 或 `DRILL_3` 两种写法。
pub fn parse_slot(arg: Option<&String>) -> Result<SlotIndex, SyncError> {
    let arg = arg
        .map(|value| value.trim())
        .ok_or_else(|| SyncError::Validation("缺少槽位编号".to_string()))?;
    SlotIndex::from_tag(arg)
        .or_else(|| arg.parse::<usize>().ok().and_then(SlotIndex::new))
        .ok_or_else(|| SyncError::Validation(format!("无效的槽位: {arg}")))
}

fn updated_message(action: &str, index: SlotIndex, updated: usize) -> String {
    if updated == 0 {
        format!("{} 已{action}，图纸中未找到匹配的属性", index.tag())
    } else {
        format!("{} 已{action}，更新 {updated} 处", index.tag())
    }
}

struct SetCommand;

impl<S: SnapshotStore> CommandHandler<S> for SetCommand {
    fn name(&self) -> &'static str {
        "set"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_, S>,
    ) -> CommandResponse {
        CommandResponse::from_result(run_set(request, context))
    }
}

fn run_set<S: SnapshotStore>(
    request: &CommandRequest,
    context: &mut CommandContext<'_, S>,
) -> Result<String, SyncError> {
    let index = parse_slot(request.args.first())?;
    let value = request.args.get(1..).unwrap_or_default().join(" ");
    let updated = context
        .engine
        .set_slot(&mut *context.drawing, index, &value)?;
    Ok(updated_message("设置", index, updated))
}

struct ResetCommand;

impl<S: SnapshotStore> CommandHandler<S> for ResetCommand {
    fn name(&self) -> &'static str {
        "reset"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_, S>,
    ) -> CommandResponse {
        CommandResponse::from_result(
            parse_slot(request.args.first()).and_then(|index| {
                context
                    .engine
                    .reset_slot(&mut *context.drawing, index)
                    .map(|updated| updated_message("复位", index, updated))
            }),
        )
    }
}

struct SwapCommand;

impl<S: SnapshotStore> CommandHandler<S> for SwapCommand {
    fn name(&self) -> &'static str {
        "swap"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_, S>,
    ) -> CommandResponse {
        CommandResponse::from_result(run_swap(request, context))
    }
}

fn run_swap<S: SnapshotStore>(
    request: &CommandRequest,
    context: &mut CommandContext<'_, S>,
) -> Result<String, SyncError> {
    let first = parse_slot(request.args.first())?;
    let second = parse_slot(request.args.get(1))?;
    let updated = context
        .engine
        .swap_slots(&mut *context.drawing, first, second)?;
    Ok(format!(
        "{} 与 {} 已交换，更新 {updated} 处",
        first.tag(),
        second.tag()
    ))
}

struct SetAllCommand;

impl<S: SnapshotStore> CommandHandler<S> for SetAllCommand {
    fn name(&self) -> &'static str {
        "set_all"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_, S>,
    ) -> CommandResponse {
        CommandResponse::from_result(
            context
                .engine
                .set_all(&mut *context.drawing, request.args.as_slice())
                .map(|changes| {
                    if changes.is_empty() {
                        "没有需要更新的钻孔名称".to_string()
                    } else {
                        changes
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join("\n")
                    }
                }),
        )
    }
}

struct ResetAllCommand;

impl<S: SnapshotStore> CommandHandler<S> for ResetAllCommand {
    fn name(&self) -> &'static str {
        "reset_all"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_, S>,
    ) -> CommandResponse {
        CommandResponse::from_result(context.engine.reset_all(&mut *context.drawing).map(|changes| {
            let updated: usize = changes.iter().map(|change| change.updated).sum();
            format!("已复位全部 {} 个槽位，更新 {updated} 处", changes.len())
        }))
    }
}

/// 参数为模型空间实体编号。
struct UpdateFromSelectionCommand;

impl<S: SnapshotStore> CommandHandler<S> for UpdateFromSelectionCommand {
    fn name(&self) -> &'static str {
        "update_from_selection"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_, S>,
    ) -> CommandResponse {
        CommandResponse::from_result(run_update_from_selection(request, context))
    }
}

fn run_update_from_selection<S: SnapshotStore>(
    request: &CommandRequest,
    context: &mut CommandContext<'_, S>,
) -> Result<String, SyncError> {
    let selection = request
        .args
        .iter()
        .map(|arg| {
            arg.trim()
                .parse::<u64>()
                .map(|raw| NodeHandle::entity(EntityId::new(raw)))
                .map_err(|_| SyncError::Validation(format!("无效的实体编号: {arg}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let found = context
        .engine
        .update_from_selection(&*context.drawing, &selection)?;
    let tags: Vec<String> = found.iter().map(|index| index.tag()).collect();
    Ok(if tags.is_empty() {
        "选中对象中没有钻孔属性，全部槽位已复位".to_string()
    } else {
        format!("已读取: {}", tags.join(", "))
    })
}

struct SelectOptionCommand;

impl<S: SnapshotStore> CommandHandler<S> for SelectOptionCommand {
    fn name(&self) -> &'static str {
        "select_option"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_, S>,
    ) -> CommandResponse {
        let option = request.args.join(" ");
        CommandResponse::from_result(
            context
                .engine
                .select_option(&option)
                .map(|()| format!("当前选项: {}", context.engine.selected_option())),
        )
    }
}

struct ShowCommand;

impl<S: SnapshotStore> CommandHandler<S> for ShowCommand {
    fn name(&self) -> &'static str {
        "show"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_, S>,
    ) -> CommandResponse {
        let mut lines: Vec<String> = context
            .engine
            .table()
            .iter()
            .map(|slot| format!("{} = {}", slot.index().tag(), slot.display_value()))
            .collect();
        lines.push(format!("选项 = {}", context.engine.selected_option()));
        CommandResponse::ok(lines.join("\n"))
    }
}

struct MatchOffsetsCommand;

impl<S: SnapshotStore> CommandHandler<S> for MatchOffsetsCommand {
    fn name(&self) -> &'static str {
        "match_offsets"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_, S>,
    ) -> CommandResponse {
        match apply_offsets(&mut *context.drawing, &context.offsets) {
            Ok(OffsetReport::Applied { matched, unmatched }) if unmatched.is_empty() => {
                CommandResponse::ok(format!("偏移量全部配对，共 {matched} 项"))
            }
            Ok(OffsetReport::Applied { matched, unmatched }) => CommandResponse::ok(format!(
                "配对 {matched} 项，{} 项未配对已高亮: {}",
                unmatched.len(),
                unmatched.join(", ")
            )),
            Ok(OffsetReport::Aborted { candidates }) => {
                let listed: Vec<String> = candidates.iter().map(|c| c.to_string()).collect();
                CommandResponse::err(format!(
                    "候选数值 {} 个多于表格单元格，请人工核对: {}",
                    candidates.len(),
                    listed.join(", ")
                ))
            }
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::convert::Infallible;

    use drillsync_core::document::{Attribute, Document};
    use drillsync_core::geometry::{Point2, Vector2};
    use drillsync_core::slots::{PersistedSnapshot, SlotTable};

    use super::*;

    #[derive(Default)]
    struct MemoryStore {
        saved: RefCell<Vec<PersistedSnapshot>>,
    }

    impl SnapshotStore for MemoryStore {
        type Error = Infallible;

        fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), Infallible> {
            self.saved.borrow_mut().push(snapshot.clone());
            Ok(())
        }
    }

    fn fixture() -> (Drawing, AttributeSyncEngine<MemoryStore>) {
        let mut document = Document::new();
        document.add_block_reference(
            "TITLE",
            Point2::default(),
            Vector2::default(),
            0.0,
            vec![
                Attribute::new("DRILL_1", "DRILL_1", "ATTR"),
                Attribute::new("DRILL_2", "", "ATTR"),
            ],
            "TITLE",
        );
        let drawing = Drawing::new("PAD-7", document);
        let engine = AttributeSyncEngine::new(SlotTable::new(), "NAD83", MemoryStore::default());
        (drawing, engine)
    }

    fn settings() -> OffsetSettings {
        OffsetSettings {
            table_name: "OFFSETS".to_string(),
            tolerance: 1.0,
        }
    }

    #[test]
    fn set_then_show_reports_new_value() {
        let (mut drawing, mut engine) = fixture();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            drawing: &mut drawing,
            engine: &mut engine,
            offsets: settings(),
        };

        let response = bus.dispatch(
            &CommandRequest::new("set", ["DRILL_2", "7-12-45-2", "W5"]),
            &mut context,
        );
        assert!(response.success, "{response:?}");
        assert_eq!(response.message.as_deref(), Some("DRILL_2 已设置，更新 1 处"));

        let show = bus.dispatch(&CommandRequest::new("show", Vec::<String>::new()), &mut context);
        let message = show.message.unwrap_or_default();
        assert!(message.contains("DRILL_2 = 7-12-45-2 W5"));
        assert!(message.ends_with("选项 = NAD83"));
    }

    #[test]
    fn no_op_is_a_successful_notice() {
        let (mut drawing, mut engine) = fixture();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            drawing: &mut drawing,
            engine: &mut engine,
            offsets: settings(),
        };
        let response = bus.dispatch(&CommandRequest::new("reset", ["1"]), &mut context);
        assert!(response.success);
        assert!(response.message.unwrap_or_default().contains("默认值"));
    }

    #[test]
    fn invalid_arguments_fail() {
        let (mut drawing, mut engine) = fixture();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            drawing: &mut drawing,
            engine: &mut engine,
            offsets: settings(),
        };
        for request in [
            CommandRequest::new("swap", ["1", "13"]),
            CommandRequest::new("update_from_selection", ["abc"]),
            CommandRequest::new("update_from_selection", Vec::<String>::new()),
            CommandRequest::new("match_offsets", Vec::<String>::new()),
            CommandRequest::new("unknown", Vec::<String>::new()),
        ] {
            let response = bus.dispatch(&request, &mut context);
            assert!(!response.success, "{} should fail", request.name);
        }
    }

    #[test]
    fn parse_slot_accepts_tag_or_number() {
        assert_eq!(parse_slot(Some(&"drill_4".to_string())).ok(), SlotIndex::new(4));
        assert_eq!(parse_slot(Some(&" 12 ".to_string())).ok(), SlotIndex::new(12));
        assert!(parse_slot(Some(&"0".to_string())).is_err());
        assert!(parse_slot(None).is_err());
    }

    #[test]
    fn every_builtin_command_is_registered() {
        let bus: CommandBus<MemoryStore> = CommandBus::new();
        let mut names: Vec<&str> = bus.available_commands().copied().collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "match_offsets",
                "reset",
                "reset_all",
                "select_option",
                "set",
                "set_all",
                "show",
                "swap",
                "update_from_selection",
            ]
        );
    }
}
