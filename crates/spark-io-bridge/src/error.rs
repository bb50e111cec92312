//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义桥接层对外暴露的全部失败语义：误用、写后关闭、越界、写入例程失败等；
//! - 同步写入方只认识 `std::io::Error`，因此这里同时负责错误在 `io::Error` 边界两侧的往返转换。
//!
//! ## 设计要求（What）
//! - 所有变体派生 `thiserror::Error`，满足 `Send + Sync + 'static`，可跨 `.await` 传播；
//! - 每个变体提供稳定错误码（`bridge.*`），便于日志检索与告警归类；
//! - 穿过 `io::Write` 边界后再回到桥接层的错误，必须还原为原始变体，而不是被折叠为 `Io`。

use std::{error::Error as StdError, io};

/// 写入例程或序列化器抛出的任意错误。
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// 稳定错误码，格式为 `bridge.<reason>`。
pub mod codes {
    pub const USAGE: &str = "bridge.usage";
    pub const CLOSED: &str = "bridge.closed";
    pub const BOUNDS: &str = "bridge.bounds";
    pub const WRITER: &str = "bridge.writer";
    pub const CONFIG: &str = "bridge.config";
    pub const DETACHED: &str = "bridge.detached";
    pub const IO: &str = "bridge.io";
}

/// 桥接层错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：让分块流的消费者只面对一种错误类型；无论失败发生在缓冲、环境查找还是调用方例程，
///   都以该枚举作为流的终止项交付。
/// - **契约 (What)**：
///   - `Usage`、`ClosedStream`、`Bounds` 对应协议误用，不可重试；
///   - `WriterRoutine` 携带调用方原始错误，可通过 [`std::error::Error::source`] 取回；
///   - `Io` 仅用于无法归类的协作方 I/O 错误。
/// - **执行逻辑 (How)**：跨越 `io::Write` 时通过 [`From<BridgeError> for io::Error`](From) 包装，
///   回程经 [`From<io::Error>`](From) 以 `downcast` 还原。
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// 在没有活动桥接的执行范围内调用了环境写入操作。
    #[error("write_async can only be called from within an active chunk producer")]
    Usage,

    /// 缓冲已关闭（显式关闭或收尾阶段），之后的写入与 flush 一律拒绝。
    #[error("chunk stream has been closed")]
    ClosedStream,

    /// `offset`/`length` 超出给定数据的有效范围；此时不会发生任何部分写入。
    #[error("write range out of bounds: offset {offset}, length {length}, data length {available}")]
    Bounds {
        offset: usize,
        length: usize,
        available: usize,
    },

    /// 调用方提供的写入例程自身失败，作为分块流的终止错误。
    #[error("writer routine failed: {0}")]
    WriterRoutine(#[source] BoxError),

    /// 分块容量非法（必须大于 0）。
    #[error("invalid chunk capacity {capacity}: must be greater than zero")]
    InvalidConfig { capacity: usize },

    /// 发射通道的接收端已经消失，写入例程无法再交付分块。
    #[error("chunk consumer has gone away")]
    ConsumerGone,

    /// 协作方产生的、无法归入上述类别的 I/O 错误。
    #[error(transparent)]
    Io(io::Error),
}

impl BridgeError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Usage => codes::USAGE,
            BridgeError::ClosedStream => codes::CLOSED,
            BridgeError::Bounds { .. } => codes::BOUNDS,
            BridgeError::WriterRoutine(_) => codes::WRITER,
            BridgeError::InvalidConfig { .. } => codes::CONFIG,
            BridgeError::ConsumerGone => codes::DETACHED,
            BridgeError::Io(_) => codes::IO,
        }
    }

    /// 将写入例程返回的任意错误映射进错误域。
    ///
    /// - 若错误本身就是 `BridgeError`（例如例程内部 `?` 传播了写后关闭），原样保留；
    /// - 若是 `io::Error`，交给 [`From<io::Error>`](From) 还原可能内嵌的桥接错误；
    /// - 其余一律归为 [`BridgeError::WriterRoutine`]。
    pub fn from_routine(err: impl Into<BoxError>) -> Self {
        let err = err.into();
        let err = match err.downcast::<BridgeError>() {
            Ok(bridge) => return *bridge,
            Err(other) => other,
        };
        match err.downcast::<io::Error>() {
            Ok(io_err) => BridgeError::from(*io_err),
            Err(other) => BridgeError::WriterRoutine(other),
        }
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            BridgeError::ClosedStream => io::ErrorKind::BrokenPipe,
            BridgeError::Bounds { .. } | BridgeError::InvalidConfig { .. } => {
                io::ErrorKind::InvalidInput
            }
            BridgeError::ConsumerGone => io::ErrorKind::NotConnected,
            _ => io::ErrorKind::Other,
        }
    }
}

impl From<io::Error> for BridgeError {
    fn from(err: io::Error) -> Self {
        match err.downcast::<BridgeError>() {
            Ok(bridge) => bridge,
            Err(err) => BridgeError::Io(err),
        }
    }
}

impl From<BridgeError> for io::Error {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Io(inner) => inner,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}
