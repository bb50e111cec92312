use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// 默认分块容量：4 KiB。
pub const DEFAULT_CHUNK_CAPACITY: usize = 4 * 1024;

/// 单次桥接调用的配置。
///
/// # 契约说明（What）
/// - `chunk_capacity`：每个分块的最大字节数，除最后一个（或显式 flush 产生的）分块外，
///   所有分块长度都恰好等于该值；必须大于 0。
/// - 配置在 [`produce`](crate::produce) 开始后不可变，每次调用都按值持有一份。
///
/// # 加载方式（How）
/// - 代码内构造：`BridgeConfig::new().with_chunk_capacity(n)?`；
/// - 配置文件：派生 `serde`，缺省字段取默认值，反序列化经由 [`RawBridgeConfig`] 校验，
///   容量为 0 时以 [`BridgeError::InvalidConfig`] 失败。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBridgeConfig")]
pub struct BridgeConfig {
    chunk_capacity: usize,
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以指定容量替换当前配置。
    pub fn with_chunk_capacity(self, chunk_capacity: usize) -> Result<Self, BridgeError> {
        if chunk_capacity == 0 {
            return Err(BridgeError::InvalidConfig {
                capacity: chunk_capacity,
            });
        }
        Ok(Self { chunk_capacity })
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
        }
    }
}

/// 反序列化的中间形态，未经校验。
#[derive(Deserialize)]
#[serde(default)]
struct RawBridgeConfig {
    chunk_capacity: usize,
}

impl Default for RawBridgeConfig {
    fn default() -> Self {
        Self {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
        }
    }
}

impl TryFrom<RawBridgeConfig> for BridgeConfig {
    type Error = BridgeError;

    fn try_from(raw: RawBridgeConfig) -> Result<Self, Self::Error> {
        BridgeConfig::new().with_chunk_capacity(raw.chunk_capacity)
    }
}
