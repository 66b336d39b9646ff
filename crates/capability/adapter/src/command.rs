use crate::transport::DeviceTransport;
use crate::{AdapterError, CollectOutput, SourceAdapter};
use async_trait::async_trait;
use domain::{ErrorDetail, FieldValue, ResultRecord, SourceDescriptor};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// 基于厂商 CLI 命令的代表性 adapter。
///
/// 每个采集功能映射为一条命令模板，经注入的传输通道逐台设备执行，
/// 输出按 `key=value` / `key: value` 行解析为记录字段。
pub struct CommandAdapter {
    vendor_kind: String,
    commands: BTreeMap<String, String>,
    transport: Arc<dyn DeviceTransport>,
}

impl CommandAdapter {
    pub fn new(vendor_kind: impl Into<String>, transport: Arc<dyn DeviceTransport>) -> Self {
        Self {
            vendor_kind: vendor_kind.into(),
            commands: BTreeMap::new(),
            transport,
        }
    }

    /// 注册一个功能及其设备命令。
    pub fn with_function(
        mut self,
        function: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        self.commands.insert(function.into(), command.into());
        self
    }
}

#[async_trait]
impl SourceAdapter for CommandAdapter {
    fn functions(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    async fn collect(
        &self,
        source: &SourceDescriptor,
        function: &str,
    ) -> Result<CollectOutput, AdapterError> {
        let command = self
            .commands
            .get(function)
            .ok_or_else(|| AdapterError::UnsupportedFunction(function.to_string()))?;

        let mut output = CollectOutput::default();
        for device in &source.devices {
            match self.transport.execute(device, command).await {
                Ok(raw) => {
                    let fields = parse_fields(&raw);
                    if fields.is_empty() {
                        output.device_errors.insert(
                            device.hostname.clone(),
                            ErrorDetail::new("no parseable fields in command output"),
                        );
                        continue;
                    }
                    output.records.push(ResultRecord {
                        source_id: source.source_id.clone(),
                        vendor_kind: self.vendor_kind.clone(),
                        function_name: function.to_string(),
                        device_id: Some(device.hostname.clone()),
                        collected_at_ms: now_epoch_ms(),
                        fields,
                    });
                }
                Err(err) => {
                    warn!(
                        target: "imc.adapter",
                        vendor_kind = %self.vendor_kind,
                        device = %device.hostname,
                        function = %function,
                        "device collect failed: {}",
                        err
                    );
                    output
                        .device_errors
                        .insert(device.hostname.clone(), ErrorDetail::new(err.to_string()));
                }
            }
        }
        Ok(output)
    }
}

/// 解析 `key=value` / `key: value` 行，保留原始字段名。
fn parse_fields(raw: &str) -> BTreeMap<String, FieldValue> {
    let mut fields = BTreeMap::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = split_field_line(line) else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        fields.insert(key.to_string(), parse_scalar(value));
    }
    fields
}

fn split_field_line(line: &str) -> Option<(&str, &str)> {
    // '=' 优先于 ':'，避免把 "time: 12:30" 这类值切错
    if let Some(index) = line.find('=') {
        return Some((&line[..index], &line[index + 1..]));
    }
    line.find(':')
        .map(|index| (&line[..index], &line[index + 1..]))
}

fn parse_scalar(raw: &str) -> FieldValue {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return FieldValue::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return FieldValue::Bool(false);
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return FieldValue::I64(value);
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return FieldValue::F64(value);
    }
    FieldValue::String(trimmed.to_string())
}

fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
