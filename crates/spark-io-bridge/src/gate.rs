//! 写入闸门：桥接层唯一会挂起的写入操作。
//!
//! # 模块定位（Why）
//! - 同步写入方无法在 `io::Write::write` 内部让出执行权；闸门把“同步写入”与“异步发射”拆成两步：
//!   先同步执行调用方过程，再逐个发射该过程导致封存的分块，在每次发射处响应下游背压。
//!
//! # 核心机制（How）
//! - [`Bridge`] 绑定一次调用的 [`BridgeSink`] 与单槽位发射通道；
//! - [`write_async`] 通过环境槽位定位当前 `Bridge`，[`BridgeContext::write_async`] 则直接使用显式句柄；
//! - 发射使用 `mpsc::Sender::send`，通道满时挂起，直到消费者取走上一个分块。

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{
    ambient,
    config::BridgeConfig,
    error::{BoxError, BridgeError},
    sink::BridgeSink,
};

/// 一次桥接调用的活动状态：缓冲视图 + 下游发射端。
#[derive(Clone, Debug)]
pub(crate) struct Bridge {
    sink: BridgeSink,
    emitter: mpsc::Sender<Bytes>,
}

impl Bridge {
    pub(crate) fn new(config: &BridgeConfig, emitter: mpsc::Sender<Bytes>) -> Self {
        Self {
            sink: BridgeSink::new(config),
            emitter,
        }
    }

    pub(crate) fn sink(&self) -> &BridgeSink {
        &self.sink
    }

    /// 执行同步过程，成功后发射其封存的全部分块。
    ///
    /// 过程失败时直接返回错误，不发射该过程封存的分块。
    pub(crate) async fn run<F, T, E>(&self, procedure: F) -> Result<T, BridgeError>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<BoxError>,
    {
        let value = procedure().map_err(BridgeError::from_routine)?;
        self.emit_sealed().await?;
        Ok(value)
    }

    /// 按封存顺序逐个发射已封存分块，返回发射数量。
    pub(crate) async fn emit_sealed(&self) -> Result<usize, BridgeError> {
        let sealed = self.sink.drain_sealed();
        let count = sealed.len();
        for chunk in sealed {
            tracing::trace!(len = chunk.len(), "emitting sealed chunk");
            self.emitter
                .send(chunk)
                .await
                .map_err(|_| BridgeError::ConsumerGone)?;
        }
        Ok(count)
    }

    /// 关闭缓冲并发射最后一个（可能不满的）分块。关闭是幂等的，可与手动关闭叠加。
    pub(crate) async fn finish(&self) -> Result<(), BridgeError> {
        self.sink.close();
        let tail = self.emit_sealed().await?;
        tracing::debug!(tail, "chunk buffer finalized");
        Ok(())
    }
}

/// 在当前桥接调用内执行一段同步写入，并把它封存的分块发射到下游。
///
/// # 教案式说明
/// - **意图 (Why)**：任何深度的调用栈（包括第三方同步库的回调链）都可以调用本函数，
///   无需持有桥接句柄；这是同步写入方获得“可挂起写入”的唯一入口。
/// - **契约 (What)**：
///   - 必须在 [`produce`](crate::produce) 产生的流被轮询期间调用，否则返回 [`BridgeError::Usage`]；
///   - `procedure` 的返回值原样透传；其错误经 [`BridgeError::from_routine`] 映射，
///     写后关闭等桥接错误会被还原为原始变体；
///   - 每发射一个分块都可能挂起，直到消费者拉取。
/// - **风险 (Trade-offs)**：单次过程写入的数据量超过分块容量时，多余的分块会在本次调用内暂存，
///   因此应让每次过程尽量只写少量数据。
pub async fn write_async<F, T, E>(procedure: F) -> Result<T, BridgeError>
where
    F: FnOnce() -> Result<T, E>,
    E: Into<BoxError>,
{
    let bridge = ambient::current()?;
    bridge.run(procedure).await
}

/// 写入例程持有的显式上下文。
///
/// 与环境查找等价，但不依赖任务局部存储，适合能直接传参的代码路径。
#[derive(Clone, Debug)]
pub struct BridgeContext {
    bridge: Bridge,
}

impl BridgeContext {
    pub(crate) fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }

    /// 返回可交给同步库的 `io::Write` 视图。
    pub fn sink(&self) -> BridgeSink {
        self.bridge.sink().clone()
    }

    pub fn chunk_capacity(&self) -> usize {
        self.bridge.sink().chunk_capacity()
    }

    /// 同 [`write_async`]，但直接使用本上下文绑定的桥接。
    pub async fn write_async<F, T, E>(&self, procedure: F) -> Result<T, BridgeError>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<BoxError>,
    {
        self.bridge.run(procedure).await
    }

    /// 立即关闭缓冲并发射最后一个分块；之后的写入均以 [`BridgeError::ClosedStream`] 失败。
    pub async fn close(&self) -> Result<(), BridgeError> {
        self.bridge.finish().await
    }

    #[cfg(feature = "json")]
    pub(crate) fn bridge(&self) -> &Bridge {
        &self.bridge
    }
}
