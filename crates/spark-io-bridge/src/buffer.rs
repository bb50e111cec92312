use std::{collections::VecDeque, mem};

use bytes::{Bytes, BytesMut};

use crate::{config::BridgeConfig, error::BridgeError};

/// `ChunkBuffer` 把任意粒度的同步写入切分为定长分块。
///
/// # 设计动机（Why）
/// - 同步写入方（序列化器、编码器）只会“推”字节，不关心下游按多大粒度消费；
///   该缓冲负责在累计字节达到容量时立即封存（seal）为只读分块，使下游拿到的分块大小稳定可预期。
/// - 封存后的分块以 `Bytes` 形式排队，等待写入闸门逐个发射，缓冲本身从不主动发射。
///
/// # 结构设计（How）
/// - `working`：当前工作区，一个容量为 `capacity` 的 `BytesMut`，写满即整体冻结为 `Bytes`
///   并替换为新分配的空工作区；
/// - `sealed`：已封存、尚未发射的分块队列，按封存顺序排列；
/// - `closed`：关闭标志，置位后拒绝一切写入与 flush。
///
/// # 契约说明（What）
/// - 每个封存分块长度 ≤ `capacity`；只有 `flush`/`close` 产生的分块可能不满；
/// - 单次写入跨越工作区边界时被拆分，可能封存零个、一个或多个分块，字节不丢失、不重复；
/// - 零长度写入不封存任何分块；恰好写满时封存一个分块并留下空工作区，不会预先封存空块；
/// - `close` 幂等，从未写入过的缓冲关闭后不产生分块。
#[derive(Debug)]
pub struct ChunkBuffer {
    capacity: usize,
    working: BytesMut,
    sealed: VecDeque<Bytes>,
    closed: bool,
}

impl ChunkBuffer {
    /// 按已校验的配置分配缓冲。
    pub fn new(config: &BridgeConfig) -> Self {
        let capacity = config.chunk_capacity();
        Self {
            capacity,
            working: BytesMut::with_capacity(capacity),
            sealed: VecDeque::with_capacity(1),
            closed: false,
        }
    }

    /// 以裸容量构造；容量为 0 时返回 [`BridgeError::InvalidConfig`]。
    pub fn with_capacity(capacity: usize) -> Result<Self, BridgeError> {
        let config = BridgeConfig::new().with_chunk_capacity(capacity)?;
        Ok(Self::new(&config))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 工作区中尚未封存的字节数。
    pub fn buffered(&self) -> usize {
        self.working.len()
    }

    /// 已封存、等待发射的分块数。
    pub fn sealed_len(&self) -> usize {
        self.sealed.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 追加 `data[offset..offset + length]`。
    ///
    /// # 契约
    /// - 已关闭时返回 [`BridgeError::ClosedStream`]；
    /// - 范围越界（含 `offset + length` 溢出）时返回 [`BridgeError::Bounds`]，且不写入任何字节。
    pub fn write(&mut self, data: &[u8], offset: usize, length: usize) -> Result<(), BridgeError> {
        self.ensure_open()?;
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= data.len())
            .ok_or(BridgeError::Bounds {
                offset,
                length,
                available: data.len(),
            })?;
        self.append(&data[offset..end]);
        Ok(())
    }

    /// 追加整个切片，等价于 `write(src, 0, src.len())`。
    pub fn write_slice(&mut self, src: &[u8]) -> Result<(), BridgeError> {
        self.ensure_open()?;
        self.append(src);
        Ok(())
    }

    pub fn write_one(&mut self, byte: u8) -> Result<(), BridgeError> {
        self.write_slice(&[byte])
    }

    /// 立即封存非空工作区，不论是否写满；空工作区时为空操作。
    pub fn flush(&mut self) -> Result<(), BridgeError> {
        self.ensure_open()?;
        if !self.working.is_empty() {
            self.seal();
        }
        Ok(())
    }

    /// 封存剩余字节并永久关闭；重复调用无副作用。
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if !self.working.is_empty() {
            self.seal();
        }
        self.closed = true;
    }

    /// 取走全部已封存分块（按封存顺序），并清空内部队列。
    pub fn drain_sealed(&mut self) -> Vec<Bytes> {
        self.sealed.drain(..).collect()
    }

    fn ensure_open(&self) -> Result<(), BridgeError> {
        if self.closed {
            Err(BridgeError::ClosedStream)
        } else {
            Ok(())
        }
    }

    fn append(&mut self, mut src: &[u8]) {
        while !src.is_empty() {
            let room = self.capacity - self.working.len();
            let (head, tail) = src.split_at(room.min(src.len()));
            self.working.extend_from_slice(head);
            if self.working.len() == self.capacity {
                self.seal();
            }
            src = tail;
        }
    }

    fn seal(&mut self) {
        let full = mem::replace(&mut self.working, BytesMut::with_capacity(self.capacity));
        self.sealed.push_back(full.freeze());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(buffer: &mut ChunkBuffer) -> Vec<Vec<u8>> {
        buffer
            .drain_sealed()
            .into_iter()
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    #[test]
    fn partial_write_stays_in_working_region() {
        let mut buffer = ChunkBuffer::with_capacity(5).expect("容量合法");
        buffer.write(&[1, 2], 0, 2).expect("写入不应失败");
        assert_eq!(buffer.sealed_len(), 0);
        assert_eq!(buffer.buffered(), 2);
        buffer.close();
        assert_eq!(chunks(&mut buffer), vec![vec![1, 2]]);
    }

    #[test]
    fn exact_fill_seals_once_without_empty_chunk() {
        let mut buffer = ChunkBuffer::with_capacity(5).expect("容量合法");
        buffer.write(&[1, 2, 3, 4, 5], 0, 5).expect("写入不应失败");
        assert_eq!(buffer.buffered(), 0);
        buffer.close();
        assert_eq!(chunks(&mut buffer), vec![vec![1, 2, 3, 4, 5]]);
    }

    #[test]
    fn large_write_rolls_over_many_chunks() {
        let mut buffer = ChunkBuffer::with_capacity(2).expect("容量合法");
        buffer.write(&[1, 2, 3, 4, 5], 0, 5).expect("写入不应失败");
        assert_eq!(chunks(&mut buffer), vec![vec![1, 2], vec![3, 4]]);
        buffer.close();
        assert_eq!(chunks(&mut buffer), vec![vec![5]]);
    }

    #[test]
    fn offset_and_length_select_sub_range() {
        let mut buffer = ChunkBuffer::with_capacity(8).expect("容量合法");
        buffer.write(b"xxabcxx", 2, 3).expect("子区间写入");
        buffer.write_one(b'!').expect("单字节写入");
        buffer.flush().expect("flush");
        assert_eq!(chunks(&mut buffer), vec![b"abc!".to_vec()]);
    }

    #[test]
    fn out_of_range_write_is_rejected_without_partial_effect() {
        let mut buffer = ChunkBuffer::with_capacity(2).expect("容量合法");
        let err = buffer.write(&[1, 2, 3], 2, 2).expect_err("越界写入必须失败");
        assert!(matches!(
            err,
            BridgeError::Bounds {
                offset: 2,
                length: 2,
                available: 3
            }
        ));
        assert!(buffer.write(&[1], usize::MAX, 2).is_err(), "溢出同样视为越界");
        assert_eq!(buffer.buffered(), 0);
        assert_eq!(buffer.sealed_len(), 0);
    }

    #[test]
    fn zero_length_write_and_empty_flush_seal_nothing() {
        let mut buffer = ChunkBuffer::with_capacity(3).expect("容量合法");
        buffer.write(&[9, 9], 1, 0).expect("零长度写入合法");
        buffer.flush().expect("空 flush 合法");
        buffer.close();
        assert!(buffer.drain_sealed().is_empty());
    }

    #[test]
    fn closed_buffer_rejects_writes_and_flush() {
        let mut buffer = ChunkBuffer::with_capacity(3).expect("容量合法");
        buffer.write_one(7).expect("写入");
        buffer.close();
        buffer.close();
        assert!(buffer.is_closed());
        assert!(matches!(buffer.write_one(8), Err(BridgeError::ClosedStream)));
        assert!(matches!(buffer.flush(), Err(BridgeError::ClosedStream)));
        assert_eq!(chunks(&mut buffer), vec![vec![7]]);
    }
}
