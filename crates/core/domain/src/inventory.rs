use std::collections::HashMap;

/// 单台设备描述（adapter 负责解释 params）。
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    pub hostname: String,
    pub address: String,
    pub site: String,
    pub params: HashMap<String, String>,
}

impl DeviceDescriptor {
    /// 构造无厂商参数的设备描述。
    pub fn new(
        hostname: impl Into<String>,
        address: impl Into<String>,
        site: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            address: address.into(),
            site: site.into(),
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// 一个厂商实例组及其设备清单（运行期只读）。
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub source_id: String,
    pub vendor_kind: String,
    pub site: String,
    pub devices: Vec<DeviceDescriptor>,
}

impl SourceDescriptor {
    pub fn new(
        source_id: impl Into<String>,
        vendor_kind: impl Into<String>,
        site: impl Into<String>,
        devices: Vec<DeviceDescriptor>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            vendor_kind: vendor_kind.into(),
            site: site.into(),
            devices,
        }
    }

    /// 判断设备 id（hostname）是否属于本源的设备清单。
    pub fn has_device(&self, device_id: &str) -> bool {
        self.devices.iter().any(|device| device.hostname == device_id)
    }
}
