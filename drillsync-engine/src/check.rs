//! 钻孔名称核对：比较槽位表与图纸中 `DRILL_n` 属性的实际内容。

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use drillsync_core::slots::{Slot, SlotIndex, SlotTable};
use drillsync_core::text::{extract_delimited_id, extract_revision, normalize};
use tracing::info;

use crate::graph::EntityGraph;
use crate::walker::GraphWalker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("PASS"),
            Verdict::Fail => f.write_str("FAIL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckLine {
    pub index: SlotIndex,
    pub expected: String,
    pub found: Vec<String>,
    pub verdict: Verdict,
    pub note: String,
}

impl Display for CheckLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let found = if self.found.is_empty() {
            "-".to_string()
        } else {
            self.found.join(" | ")
        };
        write!(
            f,
            "{:<9} 表格={:<20} 图纸={:<30} {}",
            self.index.tag(),
            self.expected,
            found,
            self.verdict
        )?;
        if !self.note.is_empty() {
            write!(f, "  ({})", self.note)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub drawing_name: String,
    pub revision: Option<u32>,
    pub lines: Vec<CheckLine>,
}

impl CheckReport {
    pub fn run<G>(graph: &G, drawing_name: &str, table: &SlotTable) -> Self
    where
        G: EntityGraph + ?Sized,
    {
        let mut found: HashMap<SlotIndex, Vec<String>> = HashMap::new();
        for leaf in GraphWalker::unique_leaves(graph, &graph.root()) {
            if let Some(index) = leaf.tag.as_deref().and_then(SlotIndex::from_tag) {
                found.entry(index).or_default().push(leaf.text);
            }
        }

        let lines: Vec<CheckLine> = table
            .iter()
            .map(|slot| check_slot(slot, found.remove(&slot.index()).unwrap_or_default()))
            .collect();
        let report = Self {
            drawing_name: drawing_name.to_string(),
            revision: extract_revision(drawing_name),
            lines,
        };
        info!(
            drawing = drawing_name,
            passed = report.passed(),
            failed = report.failed(),
            "钻孔名称核对完成"
        );
        report
    }

    pub fn passed(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| line.verdict == Verdict::Pass)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.lines.len() - self.passed()
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }
}

fn check_slot(slot: &Slot, found: Vec<String>) -> CheckLine {
    let expected = slot.display_value().to_string();
    let (verdict, note) = if slot.is_at_default() {
        let expected_norm = normalize(slot.default_name());
        let stray = found
            .iter()
            .any(|text| !text.trim().is_empty() && normalize(text) != expected_norm);
        if stray {
            (Verdict::Fail, "槽位未设置但图纸中有其他名称".to_string())
        } else {
            (Verdict::Pass, String::new())
        }
    } else if found.is_empty() {
        (Verdict::Fail, "图纸中未找到该属性".to_string())
    } else {
        compare_named(&expected, &found)
    };

    CheckLine {
        index: slot.index(),
        expected,
        found,
        verdict,
        note,
    }
}

/// 槽位带编号时按编号比较，否则按规范化文字比较。叶节点编号为空一律视为不一致。
fn compare_named(expected: &str, found: &[String]) -> (Verdict, String) {
    let expected_id = extract_delimited_id(expected);
    if expected_id.is_empty() {
        let expected_norm = normalize(expected);
        return if found.iter().all(|text| normalize(text) == expected_norm) {
            (Verdict::Pass, String::new())
        } else {
            (Verdict::Fail, "文字不一致".to_string())
        };
    }

    for text in found {
        let id = extract_delimited_id(text);
        if id.is_empty() {
            return (Verdict::Fail, format!("无法识别编号: {text}"));
        }
        if id != expected_id {
            return (Verdict::Fail, format!("编号不一致: {id}"));
        }
    }
    (Verdict::Pass, String::new())
}
