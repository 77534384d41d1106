//! Ingestion 错误类型

use contracts::{ContractError, OverflowPolicy};
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 通道不支持该溢出策略
    #[error("channel {channel} does not support overflow policy {policy:?}")]
    UnsupportedPolicy {
        /// 通道名
        channel: String,
        /// 请求的策略
        policy: OverflowPolicy,
    },

    /// 行情源已在运行
    #[error("feed {feed} is already running")]
    AlreadyRunning {
        /// 行情源名
        feed: String,
    },

    /// 行情源配置无效
    #[error("invalid feed config: {message}")]
    InvalidFeed {
        /// 错误消息
        message: String,
    },

    /// 契约层错误（通道关闭等）
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
