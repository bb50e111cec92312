//! `serde_json` 集成：在写入闸门内驱动 JSON 序列化。
//!
//! # 使用方式（How）
//! - 单值：在写入例程中 `json::write_json(&value).await?`，整段序列化作为一次闸门调用；
//! - 长数组：[`JsonArrayWriter`] 按元素逐个序列化，每个元素单独过闸，
//!   使分块在元素之间就能发射，而不是等整个数组序列化完毕。
//! - 只需要“把一个值变成分块流”时，直接用 [`serialize_chunks`]。

use std::{io, sync::Arc};

use serde::Serialize;

use crate::{
    ambient,
    config::BridgeConfig,
    error::BridgeError,
    gate::{Bridge, BridgeContext},
    producer::{ChunkFlow, produce},
};

fn json_error(err: serde_json::Error) -> BridgeError {
    if err.is_io() {
        BridgeError::from(io::Error::from(err))
    } else {
        BridgeError::WriterRoutine(Box::new(err))
    }
}

fn serialize_into<T>(bridge: &Bridge, value: &T) -> Result<(), BridgeError>
where
    T: Serialize + ?Sized,
{
    let mut sink = bridge.sink().clone();
    serde_json::to_writer(&mut sink, value).map_err(json_error)
}

/// 把 `value` 序列化进当前活动桥接，并发射由此封存的分块。
pub async fn write_json<T>(value: &T) -> Result<(), BridgeError>
where
    T: Serialize + ?Sized,
{
    let bridge = ambient::current()?;
    bridge.run(|| serialize_into(&bridge, value)).await
}

/// 构造只序列化单个值的分块流。
pub fn serialize_chunks<T>(config: BridgeConfig, value: T) -> ChunkFlow
where
    T: Serialize + Send + Sync + 'static,
{
    let value = Arc::new(value);
    produce(config, move |_ctx| {
        let value = Arc::clone(&value);
        async move { write_json(value.as_ref()).await }
    })
}

/// 逐元素写出 JSON 数组。
///
/// `begin` 写入 `[`，`push` 写入分隔符与元素，`finish` 写入 `]`；每一步都是一次独立的闸门调用。
/// 未调用 `finish` 就丢弃时数组保持未闭合，由调用方负责。
#[derive(Debug)]
pub struct JsonArrayWriter {
    bridge: Bridge,
    first: bool,
}

impl JsonArrayWriter {
    /// 在当前活动桥接上开始一个数组；无活动桥接时返回 [`BridgeError::Usage`]。
    pub async fn begin() -> Result<Self, BridgeError> {
        Self::open(ambient::current()?).await
    }

    /// 使用显式上下文开始一个数组。
    pub async fn begin_with(ctx: &BridgeContext) -> Result<Self, BridgeError> {
        Self::open(ctx.bridge().clone()).await
    }

    async fn open(bridge: Bridge) -> Result<Self, BridgeError> {
        bridge.run(|| bridge.sink().write_one(b'[')).await?;
        Ok(Self {
            bridge,
            first: true,
        })
    }

    pub async fn push<T>(&mut self, item: &T) -> Result<(), BridgeError>
    where
        T: Serialize + ?Sized,
    {
        let first = self.first;
        let bridge = &self.bridge;
        bridge
            .run(|| {
                if !first {
                    bridge.sink().write_one(b',')?;
                }
                serialize_into(bridge, item)
            })
            .await?;
        self.first = false;
        Ok(())
    }

    pub async fn finish(self) -> Result<(), BridgeError> {
        self.bridge
            .run(|| self.bridge.sink().write_one(b']'))
            .await
    }
}
