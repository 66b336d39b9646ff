//! adapter 注册表接线：传输通道选择 + 内置厂商档案。

use imc_adapter::{
    AdapterRegistry, CommandAdapter, DeviceTransport, ScriptedTransport, SshProcessTransport,
};
use imc_config::{AppConfig, TransportKind};
use std::sync::Arc;

/// 内置厂商档案：vendor_kind -> (功能, 设备命令)。
const VENDOR_PROFILES: &[(&str, &[(&str, &str)])] = &[
    (
        "storage-array",
        &[("capacity", "show capacity"), ("health", "show health")],
    ),
    (
        "fc-switch",
        &[("ports", "porterrshow"), ("health", "switchstatusshow")],
    ),
    (
        "backup-server",
        &[("capacity", "report storage"), ("jobs", "report jobs")],
    ),
];

/// 按配置构建 adapter 注册表。
pub fn build_registry(config: &AppConfig) -> AdapterRegistry {
    let transport: Arc<dyn DeviceTransport> = match config.transport {
        TransportKind::Ssh => Arc::new(
            SshProcessTransport::new(config.ssh_user.clone(), config.ssh_port)
                .with_connect_timeout_secs(config.ssh_connect_timeout_secs),
        ),
        TransportKind::Scripted => Arc::new(ScriptedTransport::new()),
    };

    let mut registry = AdapterRegistry::new();
    for (vendor_kind, profile) in VENDOR_PROFILES {
        let mut adapter = CommandAdapter::new(*vendor_kind, transport.clone());
        for (function, command) in *profile {
            adapter = adapter.with_function(*function, *command);
        }
        registry.register(*vendor_kind, Arc::new(adapter));
    }
    registry
}
