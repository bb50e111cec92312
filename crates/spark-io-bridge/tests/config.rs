//! 配置加载测试：TOML/JSON 文档、缺省值与非法容量。

use spark_io_bridge::{BridgeConfig, DEFAULT_CHUNK_CAPACITY};

#[test]
fn toml_document_sets_chunk_capacity() {
    let config: BridgeConfig = toml::from_str("chunk_capacity = 512").expect("合法 TOML");
    assert_eq!(config.chunk_capacity(), 512);
}

#[test]
fn missing_field_falls_back_to_default() {
    let config: BridgeConfig = toml::from_str("").expect("空文档取默认值");
    assert_eq!(config.chunk_capacity(), DEFAULT_CHUNK_CAPACITY);
    assert_eq!(config, BridgeConfig::default());
}

#[test]
fn zero_capacity_document_is_rejected() {
    let err = serde_json::from_str::<BridgeConfig>(r#"{"chunk_capacity":0}"#)
        .expect_err("零容量必须被拒绝");
    assert!(err.to_string().contains("must be greater than zero"));
}

#[test]
fn config_serializes_its_capacity() {
    let config = BridgeConfig::new()
        .with_chunk_capacity(64)
        .expect("容量合法");
    let json = serde_json::to_string(&config).expect("序列化不应失败");
    assert_eq!(json, r#"{"chunk_capacity":64}"#);
    let back: BridgeConfig = serde_json::from_str(&json).expect("回读不应失败");
    assert_eq!(back, config);
}
