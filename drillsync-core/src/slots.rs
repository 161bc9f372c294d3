//! 12 个钻孔名称槽位的内存模型及其持久化快照。

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// 槽位数量固定，与图纸中的 `DRILL_1..DRILL_12` 属性标记一一对应。
pub const SLOT_COUNT: usize = 12;

/// 属性标记前缀。
pub const TAG_PREFIX: &str = "DRILL_";

/// 1 起始的槽位序号，构造时即校验范围。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(usize);

impl SlotIndex {
    pub fn new(index: usize) -> Option<Self> {
        (1..=SLOT_COUNT).contains(&index).then_some(Self(index))
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }

    /// 依序返回全部槽位序号。
    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (1..=SLOT_COUNT).map(SlotIndex)
    }

    /// 对应的属性标记，例如 `DRILL_3`。
    pub fn tag(self) -> String {
        format!("{TAG_PREFIX}{}", self.0)
    }

    /// 从属性标记反查槽位，标记大小写不敏感。
    pub fn from_tag(tag: &str) -> Option<Self> {
        let upper = tag.trim().to_ascii_uppercase();
        let digits = upper.strip_prefix(TAG_PREFIX)?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse::<usize>().ok().and_then(Self::new)
    }

    #[inline]
    fn offset(self) -> usize {
        self.0 - 1
    }
}

impl Display for SlotIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    index: SlotIndex,
    current: String,
    default_name: String,
}

impl Slot {
    fn new(index: SlotIndex) -> Self {
        let mut slot = Self {
            index,
            current: String::new(),
            default_name: index.tag(),
        };
        slot.current = slot.reset_value();
        slot
    }

    #[inline]
    pub fn index(&self) -> SlotIndex {
        self.index
    }

    #[inline]
    pub fn current(&self) -> &str {
        &self.current
    }

    #[inline]
    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// 1 号槽位复位为默认名称，其余槽位复位为空串。
    pub fn reset_value(&self) -> String {
        if self.index.get() == 1 {
            self.default_name.clone()
        } else {
            String::new()
        }
    }

    /// 当前值为空或（大小写不敏感地）等于默认名称时视为默认状态。
    pub fn is_at_default(&self) -> bool {
        if self.index.get() == 1 {
            self.current.eq_ignore_ascii_case(&self.default_name)
        } else {
            self.current.is_empty() || self.current.eq_ignore_ascii_case(&self.default_name)
        }
    }

    /// 界面标签显示的名称：有值时为当前值，否则为默认名称。
    pub fn display_value(&self) -> &str {
        if self.current.is_empty() {
            &self.default_name
        } else {
            &self.current
        }
    }
}

/// 按序号排列的 12 个槽位。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTable {
    slots: Vec<Slot>,
}

impl SlotTable {
    pub fn new() -> Self {
        Self {
            slots: SlotIndex::all().map(Slot::new).collect(),
        }
    }

    /// 由持久化的名称列表构建。不足 12 项时以各序号的默认名称补齐，多余项丢弃。
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new();
        let mut values = values.into_iter();
        for index in SlotIndex::all() {
            match values.next() {
                Some(value) => table.set_value(index, value),
                None => table.set_value(index, index.tag()),
            }
        }
        table
    }

    #[inline]
    pub fn get(&self, index: SlotIndex) -> &Slot {
        &self.slots[index.offset()]
    }

    /// 写入前去除首尾空白。
    pub fn set_value(&mut self, index: SlotIndex, value: impl Into<String>) {
        let value = value.into();
        self.slots[index.offset()].current = value.trim().to_string();
    }

    #[inline]
    pub fn is_at_default(&self, index: SlotIndex) -> bool {
        self.get(index).is_at_default()
    }

    #[inline]
    pub fn reset_value(&self, index: SlotIndex) -> String {
        self.get(index).reset_value()
    }

    /// 交换两个槽位的当前值。
    pub fn swap(&mut self, first: SlotIndex, second: SlotIndex) {
        let first_value = std::mem::take(&mut self.slots[first.offset()].current);
        let second_value = std::mem::take(&mut self.slots[second.offset()].current);
        self.slots[first.offset()].current = second_value;
        self.slots[second.offset()].current = first_value;
    }

    /// 按序号遍历全部槽位；每次调用都会重新开始。
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    pub fn values(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.current.clone()).collect()
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new()
    }
}

/// 图纸旁的 JSON 快照：12 个名称加一个下拉框选项。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    #[serde(rename = "DrillNames")]
    pub drill_names: Vec<String>,
    #[serde(rename = "ComboBoxValue", default)]
    pub selected_option: String,
}

impl PersistedSnapshot {
    pub fn from_table(table: &SlotTable, selected_option: impl Into<String>) -> Self {
        Self {
            drill_names: table.values(),
            selected_option: selected_option.into(),
        }
    }

    pub fn to_table(&self) -> SlotTable {
        SlotTable::from_values(self.drill_names.iter().cloned())
    }
}

/// 快照的保存端。加载与回退逻辑由具体实现自行处理。
pub trait SnapshotStore {
    type Error: std::error::Error + 'static;

    fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(n: usize) -> SlotIndex {
        SlotIndex::new(n).expect("valid slot index")
    }

    #[test]
    fn reset_values_follow_first_slot_rule() {
        let table = SlotTable::new();
        assert_eq!(table.reset_value(idx(1)), "DRILL_1");
        for n in 2..=SLOT_COUNT {
            assert_eq!(table.reset_value(idx(n)), "");
        }
        assert!(table.iter().all(Slot::is_at_default));
    }

    #[test]
    fn slot_index_rejects_out_of_range() {
        assert!(SlotIndex::new(0).is_none());
        assert!(SlotIndex::new(13).is_none());
        assert_eq!(SlotIndex::from_tag("drill_12"), Some(idx(12)));
        assert_eq!(SlotIndex::from_tag("DRILL_13"), None);
        assert_eq!(SlotIndex::from_tag("DRILL_"), None);
        assert_eq!(SlotIndex::from_tag("DRILL_+3"), None);
        assert_eq!(SlotIndex::from_tag("GRID"), None);
    }

    #[test]
    fn set_value_trims_and_tracks_default_state() {
        let mut table = SlotTable::new();
        table.set_value(idx(3), "  7-12-45-2 ");
        assert_eq!(table.get(idx(3)).current(), "7-12-45-2");
        assert!(!table.is_at_default(idx(3)));

        table.set_value(idx(3), "drill_3");
        assert!(table.is_at_default(idx(3)));

        table.set_value(idx(1), "");
        assert!(!table.is_at_default(idx(1)));
        table.set_value(idx(1), "Drill_1");
        assert!(table.is_at_default(idx(1)));
    }

    #[test]
    fn display_value_falls_back_to_default_name() {
        let mut table = SlotTable::new();
        assert_eq!(table.get(idx(4)).display_value(), "DRILL_4");
        table.set_value(idx(4), "A-1");
        assert_eq!(table.get(idx(4)).display_value(), "A-1");
    }

    #[test]
    fn iteration_is_ordered_and_restartable() {
        let table = SlotTable::new();
        let first: Vec<_> = table.iter().map(|slot| slot.index().get()).collect();
        let second: Vec<_> = table.iter().map(|slot| slot.index().get()).collect();
        assert_eq!(first, (1..=12).collect::<Vec<_>>());
        assert_eq!(first, second);
    }

    #[test]
    fn short_value_lists_are_padded_with_default_names() {
        let table = SlotTable::from_values(["A", "B"]);
        assert_eq!(table.get(idx(2)).current(), "B");
        assert_eq!(table.get(idx(3)).current(), "DRILL_3");
        assert!(table.is_at_default(idx(12)));
    }

    #[test]
    fn swap_exchanges_values() {
        let mut table = SlotTable::new();
        table.set_value(idx(2), "X");
        table.set_value(idx(5), "Y");
        table.swap(idx(2), idx(5));
        assert_eq!(table.get(idx(2)).current(), "Y");
        assert_eq!(table.get(idx(5)).current(), "X");
    }

    #[test]
    fn snapshot_uses_fixed_field_names() {
        let snapshot = PersistedSnapshot::from_table(&SlotTable::new(), "NAD83");
        let json = serde_json::to_value(&snapshot).expect("serialize");
        assert_eq!(json["DrillNames"][0], "DRILL_1");
        assert_eq!(json["DrillNames"].as_array().map(Vec::len), Some(12));
        assert_eq!(json["ComboBoxValue"], "NAD83");
    }
}
