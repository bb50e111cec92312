//! 环境槽位：让没有显式句柄的嵌套代码找到当前活动的桥接。
//!
//! # 契约（What）
//! - 槽位是 `tokio::task_local!` 变量，只在某个 [`ChunkStream`](crate::ChunkStream)
//!   轮询其写入例程期间有值；轮询返回后即恢复外层的值（或无值）。
//! - 每次调用都以全新的 `scope` 安装自己的桥接，因此并发运行的调用、以及在写入例程内部
//!   嵌套创建的调用，彼此的查找结果互不串扰。

use std::future::Future;

use tokio::task::futures::TaskLocalFuture;

use crate::{error::BridgeError, gate::Bridge, sink::BridgeSink};

tokio::task_local! {
    static ACTIVE_BRIDGE: Bridge;
}

/// 在 `future` 的每次轮询期间把 `bridge` 设为当前活动桥接。
pub(crate) fn scope<F>(bridge: Bridge, future: F) -> TaskLocalFuture<Bridge, F>
where
    F: Future,
{
    ACTIVE_BRIDGE.scope(bridge, future)
}

pub(crate) fn current() -> Result<Bridge, BridgeError> {
    ACTIVE_BRIDGE
        .try_with(Bridge::clone)
        .map_err(|_| BridgeError::Usage)
}

/// 当前执行范围内是否存在活动桥接。
pub fn is_active() -> bool {
    ACTIVE_BRIDGE.try_with(|_| ()).is_ok()
}

/// 取得当前活动桥接的同步写入视图，供只拿得到“环境”的辅助代码构造序列化器。
pub fn current_sink() -> Result<BridgeSink, BridgeError> {
    current().map(|bridge| bridge.sink().clone())
}
