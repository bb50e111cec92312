#![doc = r#"
# spark-io-bridge

## 设计动机（Why）
- **定位**：让只会向 `std::io::Write` “推”字节的同步库（序列化器、编码器等）被增量、异步地驱动，
  输出一条带背压的惰性定长分块流，而不是阻塞到全部输出都驻留内存。
- **架构角色**：这是一座桥，而不是通用 I/O 框架；每次调用把一个同步写入方转换为一条异步分块流。

## 核心契约（What）
- **入口**：[`produce`] 接收 [`BridgeConfig`] 与写入例程，返回可重复物化的 [`ChunkFlow`]；
  每条 [`ChunkStream`] 产出 `Result<Bytes, BridgeError>`。
- **分块规则**：除最后一个（或显式 flush 产生的）分块外，每个分块长度恰为配置容量；
  分块边界只由累计字节位置决定，与写入如何分组无关；所有分块按序拼接等于写入的字节流。
- **挂起点**：只有 [`write_async`]（以及收尾）会挂起；写入例程在消费者拉取之前不会前进。
- **环境查找**：在例程的动态范围内，任意深度的同步/异步调用都能通过 [`write_async`]
  或 [`current_sink`] 找到本次调用的桥接；范围之外调用返回 [`BridgeError::Usage`]。

## 实现策略（How）
- [`buffer`]：`BytesMut` 工作区 + 已封存分块队列；
- [`ambient`]：`tokio::task_local!` 槽位，每次调用铸造独立作用域；
- [`gate`]：同步执行过程后逐个发射封存分块，发射经单槽位 `mpsc` 通道实现背压；
- [`producer`]：在 `Stream::poll_next` 内联驱动写入例程，不派生任务，丢弃流即取消。

## 示例

```
use std::io::Write;

use futures::StreamExt;
use spark_io_bridge::{BridgeConfig, BridgeError, produce};

# futures::executor::block_on(async {
let config = BridgeConfig::new().with_chunk_capacity(2)?;
let flow = produce(config, |ctx| async move {
    let mut sink = ctx.sink();
    ctx.write_async(|| sink.write_all(b"hello")).await
});

let chunks: Vec<_> = flow.stream().map(|chunk| chunk.map(|c| c.to_vec())).collect().await;
let chunks = chunks.into_iter().collect::<Result<Vec<_>, _>>()?;
assert_eq!(chunks, vec![b"he".to_vec(), b"ll".to_vec(), b"o".to_vec()]);
# Ok::<(), BridgeError>(())
# }).unwrap();
```
"#]

pub mod ambient;
pub mod buffer;
pub mod config;
pub mod error;
pub mod gate;
#[cfg(feature = "json")]
pub mod json;
pub mod producer;
pub mod sink;

pub use ambient::{current_sink, is_active};
pub use buffer::ChunkBuffer;
pub use config::{BridgeConfig, DEFAULT_CHUNK_CAPACITY};
pub use error::{BoxError, BridgeError};
pub use gate::{BridgeContext, write_async};
pub use producer::{ChunkFlow, ChunkStream, ProducerState, produce};
pub use sink::BridgeSink;
