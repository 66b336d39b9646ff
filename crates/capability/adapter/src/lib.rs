pub mod command;
pub mod transport;

pub use command::CommandAdapter;
pub use transport::{DeviceTransport, ScriptedTransport, SshProcessTransport, TransportError};

use async_trait::async_trait;
use domain::{ErrorDetail, ResultRecord, SourceDescriptor};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// 采集调用错误（整次调用级别；设备级失败走 device_errors）。
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("unsupported function: {0}")]
    UnsupportedFunction(String),
    #[error("adapter error: {0}")]
    Internal(String),
}

/// 未注册厂商错误。
#[derive(Debug, thiserror::Error)]
#[error("no adapter registered for vendor kind: {vendor_kind}")]
pub struct UnknownVendorError {
    pub vendor_kind: String,
}

/// 一次采集调用的输出：记录 + 设备级错误。
#[derive(Debug, Default)]
pub struct CollectOutput {
    pub records: Vec<ResultRecord>,
    pub device_errors: BTreeMap<String, ErrorDetail>,
}

/// 厂商采集适配器抽象。
///
/// 约束：
/// - 每台设备独立处理，单台失败不影响同一调用内的其他设备
/// - 底层 I/O 异常一律转为 device_errors 条目，不越过边界抛出
/// - 字段集合由厂商/功能自行定义，跨厂商归一由聚合层负责
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// 本 adapter 支持的采集功能列表。
    fn functions(&self) -> Vec<String>;

    async fn collect(
        &self,
        source: &SourceDescriptor,
        function: &str,
    ) -> Result<CollectOutput, AdapterError>;
}

/// 占位 adapter（用于接线与测试）。
#[derive(Debug, Default)]
pub struct NoopAdapter;

#[async_trait]
impl SourceAdapter for NoopAdapter {
    fn functions(&self) -> Vec<String> {
        Vec::new()
    }

    async fn collect(
        &self,
        _source: &SourceDescriptor,
        _function: &str,
    ) -> Result<CollectOutput, AdapterError> {
        Ok(CollectOutput::default())
    }
}

/// 按 vendor_kind 注册/查找 adapter 的注册表。
///
/// 未注册的 key 显式报错，不允许静默跳过。
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, vendor_kind: impl Into<String>, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(vendor_kind.into(), adapter);
    }

    pub fn lookup(&self, vendor_kind: &str) -> Result<Arc<dyn SourceAdapter>, UnknownVendorError> {
        self.adapters
            .get(vendor_kind)
            .cloned()
            .ok_or_else(|| UnknownVendorError {
                vendor_kind: vendor_kind.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup_unknown_vendor_is_explicit() {
        let registry = AdapterRegistry::new();
        let err = registry.lookup("array").err().expect("unknown vendor");
        assert_eq!(err.vendor_kind, "array");
    }

    #[test]
    fn registry_lookup_returns_registered_adapter() {
        let mut registry = AdapterRegistry::new();
        registry.register("array", Arc::new(NoopAdapter));
        let adapter = registry.lookup("array").expect("registered");
        assert!(adapter.functions().is_empty());
    }
}
