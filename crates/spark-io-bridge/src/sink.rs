use std::{io, sync::Arc};

use bytes::Bytes;
use spin::Mutex;

use crate::{buffer::ChunkBuffer, config::BridgeConfig, error::BridgeError};

/// `BridgeSink` 是 [`ChunkBuffer`] 的同步写入视图，实现 [`std::io::Write`]。
///
/// # 教案式说明
/// - **意图 (Why)**：序列化器、压缩器等同步库只接受 `io::Write`；把该视图交给它们，
///   即可在不修改其代码的前提下让输出落入分块缓冲。
/// - **逻辑 (How)**：多个句柄通过 `Arc<spin::Mutex<_>>` 共享同一缓冲，每次写入只在调用期间持锁；
///   同一次桥接调用内写入严格串行，锁不会发生真实竞争。
/// - **契约 (What)**：
///   - 写入只进入缓冲，**不会**触发发射；发射发生在下一次
///     [`write_async`](crate::write_async) 或收尾阶段；
///   - 关闭后 `write`/`flush` 返回 `io::ErrorKind::BrokenPipe`，其内部携带
///     [`BridgeError::ClosedStream`]，经 `?` 回到桥接层时会被还原；
///   - `io::Write::flush` 会立即封存当前工作区，产生一个可能不满的分块。
#[derive(Clone, Debug)]
pub struct BridgeSink {
    buffer: Arc<Mutex<ChunkBuffer>>,
}

impl BridgeSink {
    pub(crate) fn new(config: &BridgeConfig) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(ChunkBuffer::new(config))),
        }
    }

    /// 写入 `data[offset..offset + length]`，越界时不产生任何写入。
    pub fn write_range(
        &self,
        data: &[u8],
        offset: usize,
        length: usize,
    ) -> Result<(), BridgeError> {
        self.buffer.lock().write(data, offset, length)
    }

    pub fn write_one(&self, byte: u8) -> Result<(), BridgeError> {
        self.buffer.lock().write_one(byte)
    }

    /// 手动关闭：封存剩余字节并拒绝后续写入。重复关闭无副作用。
    pub fn close(&self) {
        self.buffer.lock().close();
    }

    pub fn is_closed(&self) -> bool {
        self.buffer.lock().is_closed()
    }

    pub fn chunk_capacity(&self) -> usize {
        self.buffer.lock().capacity()
    }

    pub(crate) fn drain_sealed(&self) -> Vec<Bytes> {
        self.buffer.lock().drain_sealed()
    }
}

impl io::Write for BridgeSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().write_slice(buf)?;
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.buffer.lock().write_slice(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.buffer.lock().flush().map_err(io::Error::from)
    }
}
