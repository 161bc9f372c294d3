//! 收集图面上的网格点块，供坐标转换使用。

use drillsync_core::geometry::Point2;
use drillsync_core::text::natural_compare;
use tracing::debug;

use crate::graph::{EntityGraph, Lookup, Node};

#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint {
    pub label: String,
    pub position: Point2,
}

/// 顶层块参照中带有 `tag` 属性且属性非空者视为网格点，按标签自然顺序排列。
pub fn collect_grid_points<G>(graph: &G, tag: &str) -> Vec<GridPoint>
where
    G: EntityGraph + ?Sized,
{
    let Lookup::Valid(children) = graph.children(&graph.root()) else {
        return Vec::new();
    };

    let mut points: Vec<GridPoint> = children
        .iter()
        .filter_map(|handle| {
            let Lookup::Valid(Node::Container(container)) = graph.node(handle) else {
                return None;
            };
            let position = container.insert?;
            let label = graph
                .children(handle)
                .valid()?
                .iter()
                .find_map(|child| match graph.node(child) {
                    Lookup::Valid(Node::Leaf(leaf))
                        if leaf
                            .tag
                            .as_deref()
                            .is_some_and(|t| t.eq_ignore_ascii_case(tag)) =>
                    {
                        Some(leaf.text.trim().to_string())
                    }
                    _ => None,
                })
                .filter(|label| !label.is_empty())?;
            Some(GridPoint { label, position })
        })
        .collect();

    points.sort_by(|a, b| natural_compare(&a.label, &b.label));
    debug!(count = points.len(), tag, "已收集网格点");
    points
}
