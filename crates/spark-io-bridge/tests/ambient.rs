//! `ambient` 集成测试：环境查找的可达性与隔离性。
//!
//! # 测试总览（Why）
//! - 嵌套多层、没有显式句柄的辅助函数必须能找到当前桥接；
//! - 在任何调用之外使用环境写入必须以 `Usage` 失败；
//! - 并发运行、以及相互嵌套的两次调用，各自只看到自己的桥接。

use std::io::{self, Write};

use futures::{StreamExt, future};
use spark_io_bridge::{
    BridgeConfig, BridgeError, BridgeSink, current_sink, is_active, produce, write_async,
};

fn capacity(n: usize) -> BridgeConfig {
    BridgeConfig::new()
        .with_chunk_capacity(n)
        .expect("测试容量均大于 0")
}

/// 模拟只认识 `io::Write` 的第三方同步编码器。
struct LegacyEncoder<W: Write> {
    out: W,
}

impl<W: Write> LegacyEncoder<W> {
    fn encode_record(&mut self, id: u8, body: &[u8]) -> io::Result<()> {
        self.out.write_all(&[id, body.len() as u8])?;
        self.out.write_all(body)
    }
}

/// 位于若干层调用之下、只依赖环境的辅助函数。
async fn emit_record(id: u8, body: &'static [u8]) -> Result<(), BridgeError> {
    let mut encoder = LegacyEncoder {
        out: current_sink()?,
    };
    write_async(|| encoder.encode_record(id, body)).await
}

async fn emit_all(records: &[(u8, &'static [u8])]) -> Result<(), BridgeError> {
    for (id, body) in records {
        emit_record(*id, *body).await?;
    }
    Ok(())
}

#[tokio::test]
async fn nested_helpers_find_the_active_bridge() {
    let flow = produce(capacity(4), |_ctx| async {
        assert!(is_active());
        emit_all(&[(1, &b"ab"[..]), (2, &b"cdef"[..])]).await
    });
    let bytes = flow.collect_bytes().await.expect("无错误");
    assert_eq!(bytes.as_ref(), &[1, 2, b'a', b'b', 2, 4, b'c', b'd', b'e', b'f']);
}

#[tokio::test]
async fn ambient_write_outside_producer_is_a_usage_error() {
    assert!(!is_active());
    let err = write_async(|| Ok::<_, BridgeError>(()))
        .await
        .expect_err("没有活动桥接时必须失败");
    assert!(matches!(err, BridgeError::Usage));
    assert!(matches!(current_sink(), Err(BridgeError::Usage)));
    assert!(matches!(emit_record(1, b"x").await, Err(BridgeError::Usage)));
}

#[test]
fn usage_error_does_not_need_a_runtime() {
    let err = futures::executor::block_on(write_async(|| Ok::<_, BridgeError>(())))
        .expect_err("没有活动桥接时必须失败");
    assert_eq!(err.code(), "bridge.usage");
}

/// 两次调用交替推进，彼此的环境查找不串扰。
#[tokio::test]
async fn concurrent_producers_stay_isolated() {
    let left = produce(capacity(2), |_ctx| async {
        for _ in 0..4 {
            write_async(|| current_sink()?.write_range(b"L", 0, 1)).await?;
            tokio::task::yield_now().await;
        }
        Ok::<_, BridgeError>(())
    });
    let right = produce(capacity(3), |_ctx| async {
        for _ in 0..6 {
            write_async(|| current_sink()?.write_range(b"R", 0, 1)).await?;
            tokio::task::yield_now().await;
        }
        Ok::<_, BridgeError>(())
    });

    let (l, r) = future::join(left.collect_bytes(), right.collect_bytes()).await;
    assert_eq!(l.expect("左侧无错误").as_ref(), b"LLLL");
    assert_eq!(r.expect("右侧无错误").as_ref(), b"RRRRRR");
}

/// 在写入例程内部物化另一条流：内层写入进入内层桥接，返回后外层查找恢复。
#[tokio::test]
async fn nested_producer_gets_its_own_scope() {
    let outer = produce(capacity(8), |ctx| async move {
        let outer_sink: BridgeSink = current_sink()?;
        let inner = produce(capacity(2), |_ctx| async {
            emit_record(9, b"inner").await
        });
        let inner_chunks: Vec<_> = inner.stream().collect().await;
        assert_eq!(inner_chunks.len(), 4, "7 字节按容量 2 切为 4 块");

        let after = current_sink()?;
        assert_eq!(after.chunk_capacity(), outer_sink.chunk_capacity());
        let mut sink = ctx.sink();
        ctx.write_async(|| sink.write_all(b"outer")).await
    });

    let bytes = outer.collect_bytes().await.expect("无错误");
    assert_eq!(bytes.as_ref(), b"outer");
}
