//! 钻孔名称同步引擎：维护槽位表，并把名称变更写回图纸中的文字与属性。

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use drillsync_core::slots::{PersistedSnapshot, SlotIndex, SlotTable, SnapshotStore};
use drillsync_core::text::normalize;
use tracing::{debug, error, info, warn};

use crate::errors::SyncError;
use crate::graph::{
    DocumentLock, DrawingHost, EntityGraph, LayerUnlock, LeafKind, TextLeaf, Transaction,
};
use crate::walker::GraphWalker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// 按属性标记精确匹配，忽略叶节点当前文字。
    ExactTag,
    /// 在无标记的文字中查找旧值：单行文字整串比较，多行文字做子串替换。
    SubstringOfOldValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub target_tag: String,
    pub old_value: String,
    pub new_value: String,
    pub match_mode: MatchMode,
}

impl SyncRequest {
    pub fn exact_tag(index: SlotIndex, old_value: &str, new_value: &str) -> Self {
        Self {
            target_tag: index.tag(),
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
            match_mode: MatchMode::ExactTag,
        }
    }

    pub fn substring(index: SlotIndex, old_value: &str, new_value: &str) -> Self {
        Self {
            target_tag: index.tag(),
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
            match_mode: MatchMode::SubstringOfOldValue,
        }
    }

    /// 计算该请求作用于某段文字后的结果；不匹配时返回 `None`。
    fn rewrite(&self, kind: LeafKind, tag: Option<&str>, text: &str) -> Option<String> {
        match self.match_mode {
            MatchMode::ExactTag => tag
                .filter(|tag| tag.trim().eq_ignore_ascii_case(&self.target_tag))
                .map(|_| self.new_value.clone()),
            MatchMode::SubstringOfOldValue => {
                if tag.is_some() || self.old_value.is_empty() {
                    return None;
                }
                match kind {
                    LeafKind::Text | LeafKind::TableCell => (normalize(text)
                        == normalize(&self.old_value))
                    .then(|| self.new_value.clone()),
                    LeafKind::MText => text
                        .contains(self.old_value.as_str())
                        .then(|| text.replace(self.old_value.as_str(), &self.new_value)),
                    LeafKind::Attribute => None,
                }
            }
        }
    }
}

/// 单个槽位的变更记录，用于批量操作的结果汇总。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotChange {
    pub index: SlotIndex,
    pub before: String,
    pub after: String,
    pub updated: usize,
}

impl Display for SlotChange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} ({} 处)",
            self.index.tag(),
            display_or_empty(&self.before),
            display_or_empty(&self.after),
            self.updated
        )
    }
}

fn display_or_empty(value: &str) -> &str {
    if value.is_empty() { "<空>" } else { value }
}

/// 一次写回的统计：实际改写的叶节点数，以及每个请求各自命中的数量。
#[derive(Debug, Default)]
struct ApplyReport {
    written: usize,
    per_request: Vec<usize>,
}

pub struct AttributeSyncEngine<S: SnapshotStore> {
    table: SlotTable,
    selected_option: String,
    store: S,
}

impl<S: SnapshotStore> AttributeSyncEngine<S> {
    pub fn new(table: SlotTable, selected_option: impl Into<String>, store: S) -> Self {
        Self {
            table,
            selected_option: selected_option.into(),
            store,
        }
    }

    /// 从快照恢复引擎状态。
    pub fn from_snapshot(snapshot: &PersistedSnapshot, store: S) -> Self {
        Self::new(snapshot.to_table(), snapshot.selected_option.clone(), store)
    }

    #[inline]
    pub fn table(&self) -> &SlotTable {
        &self.table
    }

    #[inline]
    pub fn selected_option(&self) -> &str {
        &self.selected_option
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn snapshot(&self) -> PersistedSnapshot {
        PersistedSnapshot::from_table(&self.table, self.selected_option.clone())
    }

    /// 把新名称写入槽位，并同步到图纸。返回被改写的叶节点数量，0 不视为错误。
    pub fn set_slot<H>(
        &mut self,
        host: &mut H,
        index: SlotIndex,
        new_value: &str,
    ) -> Result<usize, SyncError>
    where
        H: DrawingHost + ?Sized,
    {
        let new_value = new_value.trim();
        if new_value.is_empty() {
            warn!(slot = index.get(), "名称为空，拒绝写入");
            return Err(SyncError::Validation(format!("{} 的名称不能为空", index.tag())));
        }

        let slot = self.table.get(index);
        if new_value.eq_ignore_ascii_case(slot.default_name())
            || new_value.eq_ignore_ascii_case(slot.display_value())
        {
            info!(slot = index.get(), new = new_value, "名称未变化");
            return Err(SyncError::NoOp(format!(
                "{} 已经是 {new_value}",
                index.tag()
            )));
        }

        let old_value = slot.current().to_string();
        let old_display = slot.display_value().to_string();
        let requests = [
            SyncRequest::exact_tag(index, &old_value, new_value),
            SyncRequest::substring(index, &old_display, new_value),
        ];
        let report = apply_requests(host, &requests).inspect_err(|err| {
            error!(slot = index.get(), old = %old_display, new = new_value, error = %err, "写回图纸失败");
        })?;

        self.table.set_value(index, new_value);
        self.persist();
        if report.written == 0 {
            info!(slot = index.get(), "图纸中未找到匹配的属性");
        } else {
            info!(slot = index.get(), old = %old_display, new = new_value, updated = report.written, "已更新钻孔名称");
        }
        Ok(report.written)
    }

    /// 将槽位恢复为复位值。已处于默认状态时返回 `NoOp`。
    pub fn reset_slot<H>(&mut self, host: &mut H, index: SlotIndex) -> Result<usize, SyncError>
    where
        H: DrawingHost + ?Sized,
    {
        if self.table.is_at_default(index) {
            info!(slot = index.get(), "已是默认值");
            return Err(SyncError::NoOp(format!("{} 已是默认值", index.tag())));
        }
        let requests = self.reset_requests(index);
        let before = self.table.get(index).current().to_string();
        let report = apply_requests(host, &requests).inspect_err(|err| {
            error!(slot = index.get(), old = %before, error = %err, "复位写回失败");
        })?;

        self.table.set_value(index, self.table.reset_value(index));
        self.persist();
        info!(slot = index.get(), old = %before, updated = report.written, "已复位钻孔名称");
        Ok(report.written)
    }

    /// 交换两个槽位。只更新带标记的属性，自由文字不参与。
    pub fn swap_slots<H>(
        &mut self,
        host: &mut H,
        first: SlotIndex,
        second: SlotIndex,
    ) -> Result<usize, SyncError>
    where
        H: DrawingHost + ?Sized,
    {
        if first == second {
            warn!(slot = first.get(), "不能与自身交换");
            return Err(SyncError::Validation(format!(
                "{} 不能与自身交换",
                first.tag()
            )));
        }
        let first_value = self.table.get(first).current().to_string();
        let second_value = self.table.get(second).current().to_string();
        let requests = [
            SyncRequest::exact_tag(first, &first_value, &second_value),
            SyncRequest::exact_tag(second, &second_value, &first_value),
        ];
        let report = apply_requests(host, &requests).inspect_err(|err| {
            error!(first = first.get(), second = second.get(), error = %err, "交换写回失败");
        })?;

        self.table.swap(first, second);
        self.persist();
        info!(
            first = first.get(),
            second = second.get(),
            updated = report.written,
            "已交换钻孔名称"
        );
        Ok(report.written)
    }

    /// 依次提交界面输入框中的名称。空白或默认名称的输入被跳过，未变化的槽位不计入结果。
    pub fn set_all<H, V>(&mut self, host: &mut H, inputs: &[V]) -> Result<Vec<SlotChange>, SyncError>
    where
        H: DrawingHost + ?Sized,
        V: AsRef<str>,
    {
        let mut changes = Vec::new();
        for (index, input) in SlotIndex::all().zip(inputs.iter()) {
            let input = input.as_ref().trim();
            let slot = self.table.get(index);
            if input.is_empty() || input.eq_ignore_ascii_case(slot.default_name()) {
                continue;
            }
            let before = slot.display_value().to_string();
            match self.set_slot(host, index, input) {
                Ok(updated) => changes.push(SlotChange {
                    index,
                    before,
                    after: input.to_string(),
                    updated,
                }),
                Err(SyncError::NoOp(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        info!(changed = changes.len(), "批量设置完成");
        Ok(changes)
    }

    /// 无条件复位全部 12 个槽位，在同一事务内完成。
    pub fn reset_all<H>(&mut self, host: &mut H) -> Result<Vec<SlotChange>, SyncError>
    where
        H: DrawingHost + ?Sized,
    {
        let requests: Vec<SyncRequest> = SlotIndex::all()
            .flat_map(|index| self.reset_requests(index))
            .collect();
        debug!(requests = requests.len(), "批量复位请求");
        let report = apply_requests(host, &requests).inspect_err(|err| {
            error!(error = %err, "批量复位写回失败");
        })?;

        let mut changes = Vec::new();
        for (position, index) in SlotIndex::all().enumerate() {
            let before = self.table.get(index).current().to_string();
            let after = self.table.reset_value(index);
            let updated = report.per_request[position * 2] + report.per_request[position * 2 + 1];
            self.table.set_value(index, after.clone());
            changes.push(SlotChange {
                index,
                before,
                after,
                updated,
            });
        }
        self.persist();
        info!(updated = report.written, "已复位全部钻孔名称");
        Ok(changes)
    }

    /// 从选中的块参照中读取 `DRILL_n` 属性回填槽位，不修改图纸。
    /// 选中集中找不到的槽位恢复为默认名称。返回找到值的槽位。
    pub fn update_from_selection<G>(
        &mut self,
        graph: &G,
        selection: &[G::Handle],
    ) -> Result<Vec<SlotIndex>, SyncError>
    where
        G: EntityGraph + ?Sized,
    {
        if selection.is_empty() {
            warn!("未选择任何对象");
            return Err(SyncError::Validation("未选择任何对象".to_string()));
        }

        let mut found: HashMap<SlotIndex, String> = HashMap::new();
        for handle in selection {
            GraphWalker::visit_all(graph, handle, |leaf| {
                let Some(index) = leaf.tag.as_deref().and_then(SlotIndex::from_tag) else {
                    return;
                };
                let text = leaf.text.trim();
                if !text.is_empty() {
                    found.entry(index).or_insert_with(|| text.to_string());
                }
            });
        }

        let mut indices: Vec<SlotIndex> = found.keys().copied().collect();
        indices.sort();
        for index in SlotIndex::all() {
            match found.remove(&index) {
                Some(value) => self.table.set_value(index, value),
                None => {
                    let default_name = self.table.get(index).default_name().to_string();
                    self.table.set_value(index, default_name);
                }
            }
        }
        self.persist();
        info!(found = indices.len(), "已从选中对象更新钻孔名称");
        Ok(indices)
    }

    /// 更新下拉框选项并保存。
    pub fn select_option(&mut self, option: &str) -> Result<(), SyncError> {
        let option = option.trim();
        if option.is_empty() {
            return Err(SyncError::Validation("选项不能为空".to_string()));
        }
        self.selected_option = option.to_string();
        self.persist();
        Ok(())
    }

    /// 复位请求：标记属性写入复位值，自由文字由旧显示名改回默认名称。
    fn reset_requests(&self, index: SlotIndex) -> [SyncRequest; 2] {
        let slot = self.table.get(index);
        [
            SyncRequest::exact_tag(index, slot.current(), &slot.reset_value()),
            SyncRequest::substring(index, slot.display_value(), slot.default_name()),
        ]
    }

    fn persist(&self) {
        if let Err(err) = self.store.save(&self.snapshot()) {
            error!(error = %err, "保存钻孔名称快照失败");
        }
    }
}

/// 在文档锁与单一事务内执行一组同步请求。
///
/// 先遍历出全部叶节点并在副本上依次套用请求，最后只写回文字确有变化的叶节点。
/// 共享的块定义内容无论被多少实例引用都只写一次。
fn apply_requests<H>(host: &mut H, requests: &[SyncRequest]) -> Result<ApplyReport, SyncError>
where
    H: DrawingHost + ?Sized,
{
    let mut lock = DocumentLock::acquire(host)?;
    let root = lock.root();
    let leaves = GraphWalker::unique_leaves(&*lock, &root);

    let mut per_request = vec![0usize; requests.len()];
    let mut edits: Vec<(&TextLeaf<H::Handle>, String)> = Vec::new();
    for leaf in &leaves {
        let mut working = leaf.text.clone();
        let mut touched: Vec<usize> = Vec::new();
        for (position, request) in requests.iter().enumerate() {
            if let Some(rewritten) = request.rewrite(leaf.kind, leaf.tag.as_deref(), &working) {
                if rewritten != working {
                    touched.push(position);
                }
                working = rewritten;
            }
        }
        if working != leaf.text {
            for position in touched {
                per_request[position] += 1;
            }
            edits.push((leaf, working));
        }
    }

    if edits.is_empty() {
        return Ok(ApplyReport {
            written: 0,
            per_request,
        });
    }

    let mut transaction = Transaction::begin(&mut *lock)?;
    let mut written = 0;
    {
        let mut layers = LayerUnlock::new(
            &mut *transaction,
            edits.iter().map(|(leaf, _)| leaf.layer.as_str()),
        );
        for (leaf, text) in &edits {
            if layers.write_text(&leaf.handle, text)?.is_valid() {
                written += 1;
            } else {
                debug!(handle = ?leaf.handle, "叶节点在写入前失效，跳过");
            }
        }
    }
    transaction.commit()?;
    Ok(ApplyReport {
        written,
        per_request,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::convert::Infallible;

    use drillsync_core::document::{Attribute, Document};
    use drillsync_core::geometry::{Point2, Vector2};

    use super::*;
    use crate::host::Drawing;

    /// 记录每次保存内容的内存快照端。
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

    fn idx(n: usize) -> SlotIndex {
        SlotIndex::new(n).expect("valid slot index")
    }

    fn engine() -> AttributeSyncEngine<MemoryStore> {
        AttributeSyncEngine::new(SlotTable::new(), "NAD83", MemoryStore::default())
    }

    fn attribute_texts(drawing: &Drawing, tag: &str) -> Vec<String> {
        GraphWalker::unique_leaves(drawing, &drawing.root())
            .into_iter()
            .filter(|leaf| leaf.tag.as_deref() == Some(tag))
            .map(|leaf| leaf.text)
            .collect()
    }

    fn drawing_with_tags(tags: &[(&str, &str)]) -> Drawing {
        let mut document = Document::new();
        for (tag, text) in tags {
            document.add_block_reference(
                "TITLE",
                Point2::default(),
                Vector2::default(),
                0.0,
                vec![Attribute::new(*tag, *text, "ATTR")],
                "TITLE",
            );
        }
        Drawing::new("PAD-12-LAYOUT", document)
    }

    #[test]
    fn request_rewrite_rules() {
        let exact = SyncRequest::exact_tag(idx(3), "", "NEW");
        assert_eq!(
            exact.rewrite(LeafKind::Attribute, Some("drill_3"), "whatever"),
            Some("NEW".to_string())
        );
        assert_eq!(exact.rewrite(LeafKind::Attribute, Some("DRILL_31"), "x"), None);
        assert_eq!(exact.rewrite(LeafKind::Text, None, "DRILL_3"), None);

        let substring = SyncRequest::substring(idx(3), "DRILL_3", "A-1");
        assert_eq!(
            substring.rewrite(LeafKind::Text, None, " drill_3 "),
            Some("A-1".to_string())
        );
        assert_eq!(substring.rewrite(LeafKind::Text, None, "DRILL_3 NOTE"), None);
        assert_eq!(
            substring.rewrite(LeafKind::MText, None, "SEE DRILL_3\\PFOR DETAIL"),
            Some("SEE A-1\\PFOR DETAIL".to_string())
        );
        assert_eq!(substring.rewrite(LeafKind::Attribute, Some("OTHER"), "DRILL_3"), None);
    }

    #[test]
    fn set_slot_rewrites_every_tagged_leaf() {
        let mut drawing = drawing_with_tags(&[("DRILL_3", ""), ("DRILL_3", "DRILL_3"), ("DRILL_4", "")]);
        let mut engine = engine();
        let updated = engine
            .set_slot(&mut drawing, idx(3), "7-12-45-2")
            .expect("set slot");
        assert_eq!(updated, 2);
        assert_eq!(attribute_texts(&drawing, "DRILL_3"), vec!["7-12-45-2", "7-12-45-2"]);
        assert_eq!(attribute_texts(&drawing, "DRILL_4"), vec![""]);
        assert_eq!(engine.table().get(idx(3)).current(), "7-12-45-2");
        assert_eq!(engine.store().saved.borrow().len(), 1);
        assert_eq!(drawing.commit_count(), 1);
    }

    #[test]
    fn set_slot_to_default_name_is_a_no_op() {
        let mut drawing = drawing_with_tags(&[("DRILL_1", "DRILL_1")]);
        let mut engine = engine();
        let err = engine.set_slot(&mut drawing, idx(1), "drill_1").unwrap_err();
        assert!(matches!(err, SyncError::NoOp(_)));
        assert!(!err.is_failure());
        assert_eq!(drawing.commit_count(), 0);
        assert!(engine.store().saved.borrow().is_empty());
    }

    #[test]
    fn set_slot_rejects_blank_input() {
        let mut drawing = drawing_with_tags(&[]);
        let mut engine = engine();
        let err = engine.set_slot(&mut drawing, idx(2), "   ").unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[test]
    fn set_slot_without_matches_reports_zero() {
        let mut drawing = drawing_with_tags(&[("DRILL_5", "x")]);
        let mut engine = engine();
        assert_eq!(engine.set_slot(&mut drawing, idx(2), "B").expect("set"), 0);
        assert_eq!(engine.table().get(idx(2)).current(), "B");
        assert_eq!(drawing.commit_count(), 0);
        assert_eq!(engine.store().saved.borrow().len(), 1);
    }

    #[test]
    fn free_text_follows_the_previous_display_name() {
        let mut drawing = drawing_with_tags(&[("DRILL_2", "")]);
        drawing
            .document_mut()
            .add_text(Point2::default(), "DRILL_2", 2.5, 0.0, "NOTES");
        drawing
            .document_mut()
            .add_mtext(Point2::default(), "{\\fArial;DRILL_2 TD 1200m}", 2.5, None, "NOTES");
        let mut engine = engine();

        assert_eq!(engine.set_slot(&mut drawing, idx(2), "A-1").expect("set"), 3);
        let texts: Vec<String> = GraphWalker::unique_leaves(&drawing, &drawing.root())
            .into_iter()
            .filter(|leaf| leaf.tag.is_none())
            .map(|leaf| leaf.text)
            .collect();
        assert_eq!(texts, vec!["A-1", "{\\fArial;A-1 TD 1200m}"]);

        assert_eq!(engine.reset_slot(&mut drawing, idx(2)).expect("reset"), 3);
        assert_eq!(attribute_texts(&drawing, "DRILL_2"), vec![""]);
        let texts: Vec<String> = GraphWalker::unique_leaves(&drawing, &drawing.root())
            .into_iter()
            .filter(|leaf| leaf.tag.is_none())
            .map(|leaf| leaf.text)
            .collect();
        assert_eq!(texts, vec!["DRILL_2", "{\\fArial;DRILL_2 TD 1200m}"]);
    }

    #[test]
    fn reset_slot_short_circuits_when_at_default() {
        let mut drawing = drawing_with_tags(&[("DRILL_6", "")]);
        let mut engine = engine();
        let err = engine.reset_slot(&mut drawing, idx(6)).unwrap_err();
        assert!(matches!(err, SyncError::NoOp(_)));
    }

    #[test]
    fn reset_first_slot_restores_default_name() {
        let mut drawing = drawing_with_tags(&[("DRILL_1", "DRILL_1")]);
        let mut engine = engine();
        engine.set_slot(&mut drawing, idx(1), "P-1").expect("set");
        engine.reset_slot(&mut drawing, idx(1)).expect("reset");
        assert_eq!(attribute_texts(&drawing, "DRILL_1"), vec!["DRILL_1"]);
        assert_eq!(engine.table().get(idx(1)).current(), "DRILL_1");
    }

    #[test]
    fn swap_twice_restores_original_values() {
        let mut drawing = drawing_with_tags(&[("DRILL_2", "X"), ("DRILL_5", "Y")]);
        let mut engine = engine();
        engine.set_slot(&mut drawing, idx(2), "X").ok();
        engine.set_slot(&mut drawing, idx(5), "Y").ok();

        engine.swap_slots(&mut drawing, idx(2), idx(5)).expect("swap");
        assert_eq!(engine.table().get(idx(2)).current(), "Y");
        assert_eq!(attribute_texts(&drawing, "DRILL_2"), vec!["Y"]);
        assert_eq!(attribute_texts(&drawing, "DRILL_5"), vec!["X"]);

        engine.swap_slots(&mut drawing, idx(2), idx(5)).expect("swap back");
        assert_eq!(engine.table().get(idx(2)).current(), "X");
        assert_eq!(engine.table().get(idx(5)).current(), "Y");
        assert_eq!(attribute_texts(&drawing, "DRILL_2"), vec!["X"]);
    }

    #[test]
    fn swap_leaves_free_text_untouched() {
        let mut drawing = drawing_with_tags(&[("DRILL_2", "X"), ("DRILL_5", "Y")]);
        drawing
            .document_mut()
            .add_text(Point2::default(), "X", 2.5, 0.0, "NOTES");
        let mut engine = engine();
        engine.set_slot(&mut drawing, idx(2), "X").ok();
        engine.set_slot(&mut drawing, idx(5), "Y").ok();
        engine.swap_slots(&mut drawing, idx(2), idx(5)).expect("swap");
        let free: Vec<String> = GraphWalker::unique_leaves(&drawing, &drawing.root())
            .into_iter()
            .filter(|leaf| leaf.tag.is_none())
            .map(|leaf| leaf.text)
            .collect();
        assert_eq!(free, vec!["X"]);
    }

    #[test]
    fn swap_with_itself_is_rejected() {
        let mut drawing = drawing_with_tags(&[]);
        let mut engine = engine();
        let err = engine.swap_slots(&mut drawing, idx(4), idx(4)).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[test]
    fn set_all_skips_default_and_blank_inputs() {
        let mut drawing = drawing_with_tags(&[("DRILL_1", "DRILL_1"), ("DRILL_3", "")]);
        let mut engine = engine();
        let mut inputs = vec![String::new(); 12];
        inputs[0] = "DRILL_1".to_string();
        inputs[2] = "C-3".to_string();
        inputs[7] = "  ".to_string();
        let changes = engine.set_all(&mut drawing, inputs.as_slice()).expect("set all");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].index, idx(3));
        assert_eq!(changes[0].before, "DRILL_3");
        assert_eq!(changes[0].updated, 1);
        assert_eq!(changes[0].to_string(), "DRILL_3: DRILL_3 -> C-3 (1 处)");

        let again = engine.set_all(&mut drawing, inputs.as_slice()).expect("set all again");
        assert!(again.is_empty());
    }

    #[test]
    fn reset_all_issues_requests_for_every_slot() {
        let mut drawing = drawing_with_tags(&[("DRILL_4", "D-4")]);
        let mut engine = engine();
        let changes = engine.reset_all(&mut drawing).expect("reset all");
        assert_eq!(changes.len(), 12);
        assert!(changes.iter().map(|change| change.index).eq(SlotIndex::all()));
        // 槽位 4 在表中已是默认值，但图纸中的属性仍被复位。
        assert_eq!(changes[3].updated, 1);
        assert_eq!(attribute_texts(&drawing, "DRILL_4"), vec![""]);
        assert_eq!(engine.store().saved.borrow().len(), 1);
    }

    #[test]
    fn layer_locks_are_restored_after_sync() {
        let mut drawing = drawing_with_tags(&[("DRILL_3", "")]);
        drawing.set_layer_locked("ATTR", true);
        let mut engine = engine();
        assert_eq!(engine.set_slot(&mut drawing, idx(3), "Z").expect("set"), 1);
        assert_eq!(drawing.layer_locked("ATTR"), Some(true));
        assert!(!drawing.is_locked());
    }

    #[test]
    fn busy_document_fails_without_touching_the_table() {
        let mut drawing = drawing_with_tags(&[("DRILL_3", "")]);
        drawing.lock_document().expect("external lock");
        let mut engine = engine();
        let err = engine.set_slot(&mut drawing, idx(3), "Z").unwrap_err();
        assert!(matches!(err, SyncError::Host(_)));
        assert!(engine.table().is_at_default(idx(3)));
        assert!(engine.store().saved.borrow().is_empty());
    }

    #[test]
    fn update_from_selection_reads_tags_and_resets_the_rest() {
        let mut drawing = drawing_with_tags(&[("DRILL_2", " B-2 "), ("DRILL_7", ""), ("DRILL_9", "I-9")]);
        let mut engine = engine();
        engine.set_slot(&mut drawing, idx(5), "E-5").ok();

        let selection: Vec<_> = drawing.children(&drawing.root()).valid().expect("children");
        let found = engine
            .update_from_selection(&drawing, &selection[..2])
            .expect("update");
        assert_eq!(found, vec![idx(2)]);
        assert_eq!(engine.table().get(idx(2)).current(), "B-2");
        assert_eq!(engine.table().get(idx(5)).current(), "DRILL_5");
        assert_eq!(engine.table().get(idx(9)).current(), "DRILL_9");
        assert_eq!(engine.table().get(idx(1)).current(), "DRILL_1");
        assert!(engine.table().is_at_default(idx(9)));

        let saved = engine.store().saved.borrow();
        let names = &saved.last().expect("snapshot saved").drill_names;
        assert_eq!(names[1], "B-2");
        assert!(
            names
                .iter()
                .enumerate()
                .filter(|(position, _)| *position != 1)
                .all(|(position, name)| *name == format!("DRILL_{}", position + 1))
        );
        drop(saved);

        let err = engine.update_from_selection(&drawing, &[]).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[test]
    fn select_option_persists() {
        let mut engine = engine();
        engine.select_option("WGS84").expect("select");
        assert_eq!(engine.selected_option(), "WGS84");
        let saved = engine.store().saved.borrow();
        assert_eq!(saved.last().map(|s| s.selected_option.as_str()), Some("WGS84"));
    }
}
