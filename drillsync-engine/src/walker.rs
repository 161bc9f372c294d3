use tracing::{trace, warn};

use crate::graph::{EntityGraph, Lookup, Node, TextLeaf};

/// 块嵌套的保护深度。宿主格式保证无环，这里只防御异常数据。
const MAX_DEPTH: usize = 64;

/// 深度优先遍历对象图中所有文字叶节点。
///
/// 同一容器被多次引用时，每个引用实例都会重新进入一次；失效节点静默跳过。
/// 遍历本身只读，修改由调用方在访问回调之外完成。
pub struct GraphWalker;

impl GraphWalker {
    pub fn visit_all<G, F>(graph: &G, root: &G::Handle, mut visitor: F)
    where
        G: EntityGraph + ?Sized,
        F: FnMut(&TextLeaf<G::Handle>),
    {
        Self::visit_node(graph, root, 0, &mut visitor);
    }

    /// 收集所有可达叶节点，按句柄去重后保持首次出现的顺序。
    pub fn unique_leaves<G>(graph: &G, root: &G::Handle) -> Vec<TextLeaf<G::Handle>>
    where
        G: EntityGraph + ?Sized,
    {
        let mut seen = std::collections::HashSet::new();
        let mut leaves = Vec::new();
        Self::visit_all(graph, root, |leaf| {
            if seen.insert(leaf.handle.clone()) {
                leaves.push(leaf.clone());
            }
        });
        leaves
    }

    fn visit_node<G, F>(graph: &G, handle: &G::Handle, depth: usize, visitor: &mut F)
    where
        G: EntityGraph + ?Sized,
        F: FnMut(&TextLeaf<G::Handle>),
    {
        match graph.node(handle) {
            Lookup::Valid(Node::Leaf(leaf)) => visitor(&leaf),
            Lookup::Valid(Node::Container(container)) => {
                if depth >= MAX_DEPTH {
                    warn!(container = %container.name, depth, "块嵌套过深，停止展开");
                    return;
                }
                let Lookup::Valid(children) = graph.children(handle) else {
                    trace!(?handle, "容器已失效，跳过");
                    return;
                };
                for child in &children {
                    Self::visit_node(graph, child, depth + 1, visitor);
                }
            }
            Lookup::Invalidated => trace!(?handle, "节点已失效，跳过"),
        }
    }
}
