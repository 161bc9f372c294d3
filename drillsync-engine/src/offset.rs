//! 偏移量表格与图面数值文字的贪心配对。

use drillsync_core::text::{Direction, parse_number, parse_offset};
use tracing::{debug, info, warn};

use crate::errors::SyncError;
use crate::graph::{
    DocumentLock, DrawingHost, LayerUnlock, LeafKind, Lookup, Node, Transaction,
};

/// 表格中一个可解析的偏移量单元格。
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetCell {
    pub value: f64,
    pub direction: Direction,
    pub original_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Matched {
        cell: OffsetCell,
        matched_value: f64,
        display: String,
    },
    /// 超出容差，保留原文并标记高亮。
    NoMatch { cell: OffsetCell },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched(Vec<MatchResult>),
    /// 候选数多于单元格数，未做任何配对，全部候选交由人工核对。
    Aborted { candidates: Vec<f64> },
}

/// 按单元格的发现顺序逐个选取差值最小的未用候选，差值不超过容差即占用该候选。
///
/// 这是贪心配对而非全局最优：靠后的单元格可能因最佳候选已被占用而落空。
pub fn match_offsets(cells: &[OffsetCell], candidates: &[f64], tolerance: f64) -> MatchOutcome {
    if candidates.len() > cells.len() {
        return MatchOutcome::Aborted {
            candidates: candidates.to_vec(),
        };
    }

    let mut available: Vec<f64> = candidates.to_vec();
    let results = cells
        .iter()
        .map(|cell| {
            let nearest = available
                .iter()
                .enumerate()
                .map(|(position, candidate)| (position, (candidate - cell.value).abs()))
                .fold(None, |best: Option<(usize, f64)>, (position, diff)| match best {
                    Some((_, best_diff)) if best_diff <= diff => best,
                    _ => Some((position, diff)),
                });
            match nearest {
                Some((position, diff)) if diff <= tolerance => {
                    let matched_value = available.remove(position);
                    MatchResult::Matched {
                        display: format!("{matched_value:.1} {}", cell.direction),
                        matched_value,
                        cell: cell.clone(),
                    }
                }
                _ => MatchResult::NoMatch { cell: cell.clone() },
            }
        })
        .collect();
    MatchOutcome::Matched(results)
}

/// 偏移量核对的表格名称与容差。
#[derive(Debug, Clone)]
pub struct OffsetSettings {
    pub table_name: String,
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OffsetReport {
    Applied {
        matched: usize,
        unmatched: Vec<String>,
    },
    Aborted {
        candidates: Vec<f64>,
    },
}

/// 读取偏移量表格与模型空间中的数值文字，配对后把结果写回表格。
///
/// 配对成功的单元格改写为 `"<数值> <方向>"` 并取消高亮，未配对的单元格保留原文并高亮。
pub fn apply_offsets<H>(host: &mut H, settings: &OffsetSettings) -> Result<OffsetReport, SyncError>
where
    H: DrawingHost + ?Sized,
{
    let Some(table) = host.find_container(&settings.table_name) else {
        warn!(table = %settings.table_name, "未找到偏移量表格");
        return Err(SyncError::NotFound(format!(
            "偏移量表格 {}",
            settings.table_name
        )));
    };

    let mut lock = DocumentLock::acquire(host)?;
    let Lookup::Valid(cell_handles) = lock.children(&table) else {
        return Err(SyncError::NotFound(format!(
            "偏移量表格 {}",
            settings.table_name
        )));
    };

    let mut handles = Vec::new();
    let mut cells = Vec::new();
    let mut layer: Option<String> = None;
    for handle in cell_handles {
        let Lookup::Valid(Node::Leaf(leaf)) = lock.node(&handle) else {
            continue;
        };
        if let Some((value, direction)) = parse_offset(&leaf.text) {
            layer.get_or_insert_with(|| leaf.layer.clone());
            handles.push(handle);
            cells.push(OffsetCell {
                value,
                direction,
                original_text: leaf.text,
            });
        }
    }

    let root = lock.root();
    let candidates: Vec<f64> = match lock.children(&root) {
        Lookup::Valid(children) => children
            .iter()
            .filter_map(|child| match lock.node(child) {
                Lookup::Valid(Node::Leaf(leaf)) if leaf.kind == LeafKind::Text => {
                    parse_number(&leaf.text)
                }
                _ => None,
            })
            .collect(),
        Lookup::Invalidated => Vec::new(),
    };

    let results = match match_offsets(&cells, &candidates, settings.tolerance) {
        MatchOutcome::Aborted { candidates } => {
            warn!(
                cells = cells.len(),
                candidates = candidates.len(),
                "候选数值多于表格单元格，放弃自动配对"
            );
            return Ok(OffsetReport::Aborted { candidates });
        }
        MatchOutcome::Matched(results) => results,
    };

    let mut matched = 0;
    let mut unmatched = Vec::new();
    let mut transaction = Transaction::begin(&mut *lock)?;
    {
        let mut layers = LayerUnlock::new(&mut *transaction, layer.as_deref());
        for (handle, result) in handles.iter().zip(&results) {
            match result {
                MatchResult::Matched { display, .. } => {
                    if layers.write_text(handle, display)?.is_valid()
                        && layers.set_highlight(handle, false)?.is_valid()
                    {
                        matched += 1;
                    } else {
                        debug!(handle = ?handle, "单元格在写入前失效，跳过");
                    }
                }
                MatchResult::NoMatch { cell } => {
                    if layers.set_highlight(handle, true)?.is_valid() {
                        unmatched.push(cell.original_text.clone());
                    } else {
                        debug!(handle = ?handle, "单元格在写入前失效，跳过");
                    }
                }
            }
        }
    }
    transaction.commit()?;
    info!(matched, unmatched = unmatched.len(), "偏移量配对完成");
    Ok(OffsetReport::Applied { matched, unmatched })
}
