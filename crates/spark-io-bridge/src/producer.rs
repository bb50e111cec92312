use std::{
    fmt,
    future::Future,
    mem,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, stream::FusedStream};
use tokio::sync::mpsc;

use crate::{
    ambient,
    config::BridgeConfig,
    error::{BoxError, BridgeError},
    gate::{Bridge, BridgeContext},
    sink::BridgeSink,
};

/// 发射通道槽位数。单槽位保证写入例程最多领先消费者一个分块。
const EMIT_SLOTS: usize = 1;

type RoutineFuture = Pin<Box<dyn Future<Output = Result<(), BridgeError>> + Send + 'static>>;
type Routine = Arc<dyn Fn(BridgeContext) -> RoutineFuture + Send + Sync + 'static>;

/// 创建一个惰性的分块流定义。
///
/// # 教案式说明
/// - **意图 (Why)**：把“调用同步库写完全部输出”转化为“按需拉取定长分块”，
///   下游不拉取时写入例程不会前进，内存占用与分块容量同阶。
/// - **逻辑 (How)**：
///   1. 调用本函数不执行任何写入，只记录配置与例程；
///   2. 每次 [`ChunkFlow::stream`] 都生成独立的 [`ChunkStream`]，首次轮询时分配缓冲、
///      铸造新的环境作用域并启动例程；
///   3. 例程正常返回后关闭缓冲、发射尾块并结束流；
///   4. 例程失败时立即终止：不做收尾，已封存未发射的分块被丢弃，错误作为流的最后一项交付。
/// - **契约 (What)**：`routine` 每次运行都从零开始；返回的错误类型只需能转换为
///   [`BoxError`]，`BridgeError` 会被原样保留，其余归为 [`BridgeError::WriterRoutine`]。
pub fn produce<F, Fut, E>(config: BridgeConfig, routine: F) -> ChunkFlow
where
    F: Fn(BridgeContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    let routine: Routine = Arc::new(move |ctx| {
        let run = routine(ctx);
        Box::pin(async move { run.await.map_err(BridgeError::from_routine) })
    });
    ChunkFlow { config, routine }
}

/// 可重复物化的分块流定义，见 [`produce`]。
#[derive(Clone)]
pub struct ChunkFlow {
    config: BridgeConfig,
    routine: Routine,
}

impl ChunkFlow {
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// 物化一条新的、相互独立的分块流。
    pub fn stream(&self) -> ChunkStream {
        ChunkStream::new(self.config, Arc::clone(&self.routine))
    }

    pub fn into_stream(self) -> ChunkStream {
        ChunkStream::new(self.config, self.routine)
    }

    /// 运行一次并把全部分块拼接为单个 `Bytes`。
    pub async fn collect_bytes(&self) -> Result<Bytes, BridgeError> {
        let mut stream = self.stream();
        let mut out = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out.freeze())
    }
}

impl fmt::Debug for ChunkFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkFlow")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// 单次调用的外部可见阶段。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProducerState {
    /// 尚未被轮询，缓冲未分配。
    NotStarted,
    /// 写入例程执行中。
    Running,
    /// 缓冲已关闭（收尾或手动关闭），或例程已结束但仍有分块待交付。
    Finalizing,
    /// 终态。
    Closed,
}

struct Launch {
    config: BridgeConfig,
    routine: Routine,
}

struct Running {
    task: RoutineFuture,
    chunks: mpsc::Receiver<Bytes>,
    sink: BridgeSink,
}

enum Phase {
    NotStarted(Launch),
    Running(Running),
    Draining {
        chunks: mpsc::Receiver<Bytes>,
        failure: Option<BridgeError>,
    },
    Closed,
}

impl Launch {
    fn start(self) -> Running {
        let (emitter, chunks) = mpsc::channel(EMIT_SLOTS);
        let bridge = Bridge::new(&self.config, emitter);
        let sink = bridge.sink().clone();
        let context = BridgeContext::new(bridge.clone());
        let routine = self.routine;
        tracing::debug!(
            chunk_capacity = self.config.chunk_capacity(),
            "chunk producer started"
        );
        let task = ambient::scope(bridge.clone(), async move {
            routine(context).await?;
            bridge.finish().await
        });
        Running {
            task: Box::pin(task),
            chunks,
            sink,
        }
    }
}

/// 单次、不可重启的分块流。
///
/// 写入例程在 `poll_next` 内联驱动，不会派生任何任务；丢弃本流即丢弃例程、缓冲与通道，
/// 不会强制 flush。
pub struct ChunkStream {
    phase: Phase,
    emitted: usize,
}

impl ChunkStream {
    fn new(config: BridgeConfig, routine: Routine) -> Self {
        Self {
            phase: Phase::NotStarted(Launch { config, routine }),
            emitted: 0,
        }
    }

    pub fn state(&self) -> ProducerState {
        match &self.phase {
            Phase::NotStarted(_) => ProducerState::NotStarted,
            Phase::Running(run) if run.sink.is_closed() => ProducerState::Finalizing,
            Phase::Running(_) => ProducerState::Running,
            Phase::Draining { .. } => ProducerState::Finalizing,
            Phase::Closed => ProducerState::Closed,
        }
    }

    /// 已交付给消费者的分块数。
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    fn deliver(&mut self, chunk: Bytes) -> Poll<Option<Result<Bytes, BridgeError>>> {
        self.emitted += 1;
        Poll::Ready(Some(Ok(chunk)))
    }
}

impl Stream for ChunkStream {
    type Item = Result<Bytes, BridgeError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match mem::replace(&mut this.phase, Phase::Closed) {
                Phase::NotStarted(launch) => this.phase = Phase::Running(launch.start()),
                Phase::Running(mut run) => {
                    if let Poll::Ready(Some(chunk)) = run.chunks.poll_recv(cx) {
                        this.phase = Phase::Running(run);
                        return this.deliver(chunk);
                    }
                    match run.task.as_mut().poll(cx) {
                        Poll::Pending => {
                            // 例程挂起在发射上时，刚送入通道的分块要在本轮交付。
                            let handed = run.chunks.poll_recv(cx);
                            this.phase = Phase::Running(run);
                            return match handed {
                                Poll::Ready(Some(chunk)) => this.deliver(chunk),
                                _ => Poll::Pending,
                            };
                        }
                        Poll::Ready(outcome) => {
                            let Running { task, chunks, .. } = run;
                            drop(task);
                            if let Err(err) = &outcome {
                                tracing::debug!(
                                    code = err.code(),
                                    error = %err,
                                    "writer routine aborted, unsent chunks discarded"
                                );
                            }
                            this.phase = Phase::Draining {
                                chunks,
                                failure: outcome.err(),
                            };
                        }
                    }
                }
                Phase::Draining { mut chunks, failure } => match chunks.try_recv() {
                    Ok(chunk) => {
                        this.phase = Phase::Draining { chunks, failure };
                        return this.deliver(chunk);
                    }
                    Err(_) => {
                        tracing::debug!(emitted = this.emitted, "chunk stream closed");
                        return Poll::Ready(failure.map(Err));
                    }
                },
                Phase::Closed => return Poll::Ready(None),
            }
        }
    }
}

impl FusedStream for ChunkStream {
    fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Closed)
    }
}

impl fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream")
            .field("state", &self.state())
            .field("emitted", &self.emitted)
            .finish()
    }
}
