pub mod check;
pub mod command;
pub mod graph;
pub mod grid;
pub mod host;
pub mod offset;
pub mod sync;
pub mod walker;

pub mod errors {
    use thiserror::Error;

    /// 宿主文档在加锁、事务或写入阶段给出的错误。
    #[derive(Debug, Error)]
    pub enum HostError {
        #[error("document is already locked")]
        DocumentLocked,
        #[error("a transaction is already active")]
        TransactionActive,
        #[error("no active transaction")]
        NoTransaction,
        #[error("layer {0} is locked")]
        LayerLocked(String),
    }

    #[derive(Debug, Error)]
    pub enum SyncError {
        #[error("输入无效: {0}")]
        Validation(String),
        #[error("{0}")]
        NoOp(String),
        #[error("未找到: {0}")]
        NotFound(String),
        #[error(transparent)]
        Host(#[from] HostError),
    }

    impl SyncError {
        /// `NoOp` 只是提示信息，不视为失败。
        #[inline]
        pub fn is_failure(&self) -> bool {
            !matches!(self, SyncError::NoOp(_))
        }
    }
}
