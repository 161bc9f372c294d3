//! 宿主文档对象图的抽象，以及加锁、事务、图层解锁三种作用域守卫。

use std::fmt::Debug;
use std::hash::Hash;
use std::ops::{Deref, DerefMut};

use drillsync_core::geometry::Point2;
use tracing::{debug, warn};

use crate::errors::HostError;

/// 宿主句柄在两次访问之间可能失效，失效一律以 `Invalidated` 表示。
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Valid(T),
    Invalidated,
}

impl<T> Lookup<T> {
    #[inline]
    pub fn valid(self) -> Option<T> {
        match self {
            Lookup::Valid(value) => Some(value),
            Lookup::Invalidated => None,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, Lookup::Valid(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafKind {
    Text,
    MText,
    Attribute,
    TableCell,
}

/// 带文字内容的叶节点。属性类叶节点带有标记，其余为 `None`。
#[derive(Debug, Clone, PartialEq)]
pub struct TextLeaf<H> {
    pub handle: H,
    pub kind: LeafKind,
    pub tag: Option<String>,
    pub text: String,
    pub layer: String,
}

/// 容器节点：块参照或表格。
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerRef<H> {
    pub handle: H,
    pub name: String,
    pub insert: Option<Point2>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node<H> {
    Leaf(TextLeaf<H>),
    Container(ContainerRef<H>),
}

/// 可遍历、可写入文字的对象图。
pub trait EntityGraph {
    type Handle: Clone + Eq + Hash + Debug;

    /// 模型空间根容器。
    fn root(&self) -> Self::Handle;

    fn node(&self, handle: &Self::Handle) -> Lookup<Node<Self::Handle>>;

    /// 容器的直接子节点；叶节点返回空列表。
    fn children(&self, handle: &Self::Handle) -> Lookup<Vec<Self::Handle>>;

    /// 按名称查找顶层容器（表格或块参照）。
    fn find_container(&self, name: &str) -> Option<Self::Handle>;

    fn write_text(&mut self, leaf: &Self::Handle, text: &str) -> Result<Lookup<()>, HostError>;

    fn set_highlight(&mut self, leaf: &Self::Handle, on: bool) -> Result<Lookup<()>, HostError>;
}

/// 宿主文档：在对象图之上提供文档锁、事务与图层锁定状态。
pub trait DrawingHost: EntityGraph {
    fn drawing_name(&self) -> &str;

    fn lock_document(&mut self) -> Result<(), HostError>;

    fn unlock_document(&mut self);

    fn begin_transaction(&mut self) -> Result<(), HostError>;

    fn commit_transaction(&mut self) -> Result<(), HostError>;

    fn abort_transaction(&mut self);

    /// 图层不存在时返回 `None`。
    fn layer_locked(&self, name: &str) -> Option<bool>;

    fn set_layer_locked(&mut self, name: &str, locked: bool);
}

/// 文档锁，离开作用域时释放。
pub struct DocumentLock<'a, H: DrawingHost + ?Sized> {
    host: &'a mut H,
}

impl<'a, H: DrawingHost + ?Sized> DocumentLock<'a, H> {
    pub fn acquire(host: &'a mut H) -> Result<Self, HostError> {
        host.lock_document()?;
        debug!(drawing = host.drawing_name(), "已锁定文档");
        Ok(Self { host })
    }
}

impl<H: DrawingHost + ?Sized> Deref for DocumentLock<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: DrawingHost + ?Sized> DerefMut for DocumentLock<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: DrawingHost + ?Sized> Drop for DocumentLock<'_, H> {
    fn drop(&mut self) {
        self.host.unlock_document();
        debug!(drawing = self.host.drawing_name(), "已释放文档锁");
    }
}

/// 宿主事务。未调用 [`Transaction::commit`] 即被丢弃时整体回滚。
pub struct Transaction<'a, H: DrawingHost + ?Sized> {
    host: &'a mut H,
    committed: bool,
}

impl<'a, H: DrawingHost + ?Sized> Transaction<'a, H> {
    pub fn begin(host: &'a mut H) -> Result<Self, HostError> {
        host.begin_transaction()?;
        Ok(Self {
            host,
            committed: false,
        })
    }

    pub fn commit(mut self) -> Result<(), HostError> {
        self.host.commit_transaction()?;
        self.committed = true;
        Ok(())
    }
}

impl<H: DrawingHost + ?Sized> Deref for Transaction<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: DrawingHost + ?Sized> DerefMut for Transaction<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: DrawingHost + ?Sized> Drop for Transaction<'_, H> {
    fn drop(&mut self) {
        if !self.committed {
            warn!(drawing = self.host.drawing_name(), "事务未提交，已回滚");
            self.host.abort_transaction();
        }
    }
}

/// 临时解锁若干图层，离开作用域时无条件恢复原有锁定状态。
pub struct LayerUnlock<'a, H: DrawingHost + ?Sized> {
    host: &'a mut H,
    unlocked: Vec<String>,
}

impl<'a, H: DrawingHost + ?Sized> LayerUnlock<'a, H> {
    pub fn new<'n, I>(host: &'a mut H, layers: I) -> Self
    where
        I: IntoIterator<Item = &'n str>,
    {
        let mut unlocked: Vec<String> = Vec::new();
        for layer in layers {
            if unlocked.iter().any(|name| name == layer) {
                continue;
            }
            if host.layer_locked(layer) == Some(true) {
                host.set_layer_locked(layer, false);
                unlocked.push(layer.to_string());
            }
        }
        if !unlocked.is_empty() {
            debug!(layers = ?unlocked, "已临时解锁图层");
        }
        Self { host, unlocked }
    }
}

impl<H: DrawingHost + ?Sized> Deref for LayerUnlock<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: DrawingHost + ?Sized> DerefMut for LayerUnlock<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: DrawingHost + ?Sized> Drop for LayerUnlock<'_, H> {
    fn drop(&mut self) {
        for layer in &self.unlocked {
            self.host.set_layer_locked(layer, true);
        }
    }
}
