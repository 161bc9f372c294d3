//! 以 [`Document`] 为载体的进程内宿主实现。

use drillsync_core::document::{Document, Entity, EntityId};
use tracing::trace;

use crate::errors::HostError;
use crate::graph::{ContainerRef, DrawingHost, EntityGraph, LeafKind, Lookup, Node, TextLeaf};

/// 实体所在位置：模型空间，或某个块定义内部的第 `index` 个实体。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityLocation {
    ModelSpace(EntityId),
    Block { block: String, index: usize },
}

/// 对象图句柄。块定义内的节点由该块的所有实例共享同一个句柄。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeHandle {
    ModelSpace,
    Entity(EntityLocation),
    Attribute {
        owner: EntityLocation,
        index: usize,
    },
    Cell {
        table: EntityLocation,
        row: usize,
        column: usize,
    },
}

impl NodeHandle {
    #[inline]
    pub fn entity(id: EntityId) -> Self {
        NodeHandle::Entity(EntityLocation::ModelSpace(id))
    }
}

#[derive(Debug)]
pub struct Drawing {
    name: String,
    document: Document,
    locked: bool,
    transaction: Option<Document>,
    commits: usize,
}

impl Drawing {
    pub fn new(name: impl Into<String>, document: Document) -> Self {
        Self {
            name: name.into(),
            document,
            locked: false,
            transaction: None,
            commits: 0,
        }
    }

    #[inline]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[inline]
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    #[inline]
    pub fn into_document(self) -> Document {
        self.document
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// 已提交的事务数量。
    #[inline]
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    fn entity_at(&self, location: &EntityLocation) -> Option<&Entity> {
        match location {
            EntityLocation::ModelSpace(id) => self.document.entity(*id),
            EntityLocation::Block { block, index } => {
                self.document.block(block)?.entities.get(*index)
            }
        }
    }

    fn entity_at_mut(&mut self, location: &EntityLocation) -> Option<&mut Entity> {
        match location {
            EntityLocation::ModelSpace(id) => self.document.entity_mut(*id),
            EntityLocation::Block { block, index } => {
                self.document.block_mut(block)?.entities.get_mut(*index)
            }
        }
    }

    fn leaf_layer(&self, handle: &NodeHandle) -> Option<String> {
        match self.node(handle) {
            Lookup::Valid(Node::Leaf(leaf)) => Some(leaf.layer),
            _ => None,
        }
    }

    fn ensure_writable(&self, handle: &NodeHandle) -> Result<Lookup<()>, HostError> {
        let Some(layer) = self.leaf_layer(handle) else {
            trace!(?handle, "写入目标已失效");
            return Ok(Lookup::Invalidated);
        };
        if self.layer_locked(&layer) == Some(true) {
            return Err(HostError::LayerLocked(layer));
        }
        Ok(Lookup::Valid(()))
    }

    fn leaf_text_mut(&mut self, handle: &NodeHandle) -> Option<&mut String> {
        match handle {
            NodeHandle::Entity(location) => match self.entity_at_mut(location)? {
                Entity::Text(text) => Some(&mut text.content),
                Entity::MText(mtext) => Some(&mut mtext.content),
                _ => None,
            },
            NodeHandle::Attribute { owner, index } => match self.entity_at_mut(owner)? {
                Entity::BlockReference(reference) => reference
                    .attributes
                    .get_mut(*index)
                    .map(|attribute| &mut attribute.text),
                _ => None,
            },
            NodeHandle::Cell { table, row, column } => match self.entity_at_mut(table)? {
                Entity::Table(table) => table
                    .rows
                    .get_mut(*row)
                    .and_then(|cells| cells.get_mut(*column))
                    .map(|cell| &mut cell.text),
                _ => None,
            },
            NodeHandle::ModelSpace => None,
        }
    }
}

impl EntityGraph for Drawing {
    type Handle = NodeHandle;

    fn root(&self) -> NodeHandle {
        NodeHandle::ModelSpace
    }

    fn node(&self, handle: &NodeHandle) -> Lookup<Node<NodeHandle>> {
        let node = match handle {
            NodeHandle::ModelSpace => Some(Node::Container(ContainerRef {
                handle: NodeHandle::ModelSpace,
                name: "*MODEL_SPACE".to_string(),
                insert: None,
            })),
            NodeHandle::Entity(location) => {
                self.entity_at(location).map(|entity| match entity {
                    Entity::Text(text) => Node::Leaf(TextLeaf {
                        handle: handle.clone(),
                        kind: LeafKind::Text,
                        tag: None,
                        text: text.content.clone(),
                        layer: text.layer.clone(),
                    }),
                    Entity::MText(mtext) => Node::Leaf(TextLeaf {
                        handle: handle.clone(),
                        kind: LeafKind::MText,
                        tag: None,
                        text: mtext.content.clone(),
                        layer: mtext.layer.clone(),
                    }),
                    Entity::BlockReference(reference) => Node::Container(ContainerRef {
                        handle: handle.clone(),
                        name: reference.name.clone(),
                        insert: Some(reference.insert),
                    }),
                    Entity::Table(table) => Node::Container(ContainerRef {
                        handle: handle.clone(),
                        name: table.name.clone(),
                        insert: Some(table.insert),
                    }),
                })
            }
            NodeHandle::Attribute { owner, index } => match self.entity_at(owner) {
                Some(Entity::BlockReference(reference)) => {
                    reference.attributes.get(*index).map(|attribute| {
                        Node::Leaf(TextLeaf {
                            handle: handle.clone(),
                            kind: LeafKind::Attribute,
                            tag: Some(attribute.tag.clone()),
                            text: attribute.text.clone(),
                            layer: attribute.layer.clone(),
                        })
                    })
                }
                _ => None,
            },
            NodeHandle::Cell { table, row, column } => match self.entity_at(table) {
                Some(Entity::Table(entity)) => entity
                    .rows
                    .get(*row)
                    .and_then(|cells| cells.get(*column))
                    .map(|cell| {
                        Node::Leaf(TextLeaf {
                            handle: handle.clone(),
                            kind: LeafKind::TableCell,
                            tag: None,
                            text: cell.text.clone(),
                            layer: entity.layer.clone(),
                        })
                    }),
                _ => None,
            },
        };
        match node {
            Some(node) => Lookup::Valid(node),
            None => Lookup::Invalidated,
        }
    }

    fn children(&self, handle: &NodeHandle) -> Lookup<Vec<NodeHandle>> {
        match handle {
            NodeHandle::ModelSpace => Lookup::Valid(
                self.document
                    .entities()
                    .map(|(id, _)| NodeHandle::entity(*id))
                    .collect(),
            ),
            NodeHandle::Entity(location) => match self.entity_at(location) {
                Some(Entity::BlockReference(reference)) => {
                    let mut children: Vec<NodeHandle> = (0..reference.attributes.len())
                        .map(|index| NodeHandle::Attribute {
                            owner: location.clone(),
                            index,
                        })
                        .collect();
                    // 外部参照未解析时块定义可能缺失，只保留实例属性。
                    if let Some(definition) = self.document.block(&reference.name) {
                        children.extend((0..definition.entities.len()).map(|index| {
                            NodeHandle::Entity(EntityLocation::Block {
                                block: reference.name.clone(),
                                index,
                            })
                        }));
                    }
                    Lookup::Valid(children)
                }
                Some(Entity::Table(table)) => Lookup::Valid(
                    table
                        .rows
                        .iter()
                        .enumerate()
                        .flat_map(|(row, cells)| {
                            (0..cells.len()).map(move |column| (row, column))
                        })
                        .map(|(row, column)| NodeHandle::Cell {
                            table: location.clone(),
                            row,
                            column,
                        })
                        .collect(),
                ),
                Some(_) => Lookup::Valid(Vec::new()),
                None => Lookup::Invalidated,
            },
            NodeHandle::Attribute { .. } | NodeHandle::Cell { .. } => match self.node(handle) {
                Lookup::Valid(_) => Lookup::Valid(Vec::new()),
                Lookup::Invalidated => Lookup::Invalidated,
            },
        }
    }

    fn find_container(&self, name: &str) -> Option<NodeHandle> {
        if let Some((id, _)) = self.document.table_by_name(name) {
            return Some(NodeHandle::entity(id));
        }
        self.document.entities().find_map(|(id, entity)| match entity {
            Entity::BlockReference(reference) if reference.name.eq_ignore_ascii_case(name) => {
                Some(NodeHandle::entity(*id))
            }
            _ => None,
        })
    }

    fn write_text(&mut self, leaf: &NodeHandle, text: &str) -> Result<Lookup<()>, HostError> {
        if !self.ensure_writable(leaf)?.is_valid() {
            return Ok(Lookup::Invalidated);
        }
        match self.leaf_text_mut(leaf) {
            Some(target) => {
                *target = text.to_string();
                Ok(Lookup::Valid(()))
            }
            None => Ok(Lookup::Invalidated),
        }
    }

    fn set_highlight(&mut self, leaf: &NodeHandle, on: bool) -> Result<Lookup<()>, HostError> {
        let NodeHandle::Cell { table, row, column } = leaf else {
            return Ok(Lookup::Invalidated);
        };
        if !self.ensure_writable(leaf)?.is_valid() {
            return Ok(Lookup::Invalidated);
        }
        let cell = match self.entity_at_mut(table) {
            Some(Entity::Table(entity)) => entity
                .rows
                .get_mut(*row)
                .and_then(|cells| cells.get_mut(*column)),
            _ => None,
        };
        match cell {
            Some(cell) => {
                cell.highlighted = on;
                Ok(Lookup::Valid(()))
            }
            None => Ok(Lookup::Invalidated),
        }
    }
}

impl DrawingHost for Drawing {
    fn drawing_name(&self) -> &str {
        &self.name
    }

    fn lock_document(&mut self) -> Result<(), HostError> {
        if self.locked {
            return Err(HostError::DocumentLocked);
        }
        self.locked = true;
        Ok(())
    }

    fn unlock_document(&mut self) {
        self.locked = false;
    }

    fn begin_transaction(&mut self) -> Result<(), HostError> {
        if self.transaction.is_some() {
            return Err(HostError::TransactionActive);
        }
        self.transaction = Some(self.document.clone());
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), HostError> {
        if self.transaction.take().is_none() {
            return Err(HostError::NoTransaction);
        }
        self.commits += 1;
        Ok(())
    }

    fn abort_transaction(&mut self) {
        if let Some(snapshot) = self.transaction.take() {
            self.document = snapshot;
        }
    }

    fn layer_locked(&self, name: &str) -> Option<bool> {
        self.document.layer(name).map(|layer| layer.is_locked)
    }

    fn set_layer_locked(&mut self, name: &str, locked: bool) {
        self.document.set_layer_locked(name, locked);
    }
}
