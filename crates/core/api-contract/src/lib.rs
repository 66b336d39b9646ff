//! 稳定的 DTO 与 API 响应契约。

use domain::{CollectionRun, DeviceDescriptor, RunStatus, SourceDescriptor, UnitStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 采集触发请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectRequest {
    pub sources: Vec<SourceDto>,
    /// vendor_kind -> 功能清单；缺省时由 adapter 自述能力兜底。
    #[serde(default)]
    pub functions_per_vendor: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub options: Option<RunOptionsDto>,
    #[serde(default)]
    pub forecast: Option<ForecastRequestDto>,
}

/// 源描述请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDto {
    pub source_id: String,
    pub vendor_kind: String,
    #[serde(default)]
    pub site: String,
    pub devices: Vec<DeviceDto>,
}

impl SourceDto {
    pub fn into_domain(self) -> SourceDescriptor {
        let site = self.site;
        let devices = self
            .devices
            .into_iter()
            .map(|device| device.into_domain(&site))
            .collect();
        SourceDescriptor::new(self.source_id, self.vendor_kind, site, devices)
    }
}

/// 设备描述请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub hostname: String,
    pub address: String,
    /// 缺省继承所属源的 site。
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl DeviceDto {
    pub fn into_domain(self, source_site: &str) -> DeviceDescriptor {
        let site = self
            .site
            .filter(|site| !site.is_empty())
            .unwrap_or_else(|| source_site.to_string());
        let mut device = DeviceDescriptor::new(self.hostname, self.address, site);
        device.params = self.params;
        device
    }
}

/// 运行参数请求体（缺省项回落到服务配置）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptionsDto {
    pub max_concurrency: Option<usize>,
    pub unit_timeout_ms: Option<u64>,
    pub max_retries: Option<u64>,
    pub backoff_ms: Option<u64>,
}

/// 预测请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastRequestDto {
    pub history: Vec<HistoryPointDto>,
    pub horizon_days: Vec<u32>,
    #[serde(default)]
    pub events: Vec<ForecastEventDto>,
}

/// 历史观测点。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPointDto {
    pub ts_ms: i64,
    pub value: f64,
}

/// 已知未来事件请求体。kind 取 "provision" / "recovery"。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastEventDto {
    pub at_ms: i64,
    pub amount_delta: f64,
    pub kind: String,
}

/// 运行摘要（不携带完整记录，记录经聚合报表体现）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummaryDto {
    pub started_at_ms: i64,
    pub finished_at_ms: i64,
    pub run_status: RunStatus,
    pub outcomes: Vec<OutcomeSummaryDto>,
}

/// 单元终态摘要。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeSummaryDto {
    pub source_id: String,
    pub vendor_kind: String,
    pub function_name: String,
    pub status: UnitStatus,
    pub record_count: usize,
    pub device_error_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u64,
    pub elapsed_ms: u64,
}

impl RunSummaryDto {
    pub fn from_run(run: &CollectionRun) -> Self {
        Self {
            started_at_ms: run.started_at_ms,
            finished_at_ms: run.finished_at_ms,
            run_status: run.run_status,
            outcomes: run
                .outcomes
                .iter()
                .map(|outcome| OutcomeSummaryDto {
                    source_id: outcome.source_id.clone(),
                    vendor_kind: outcome.vendor_kind.clone(),
                    function_name: outcome.function_name.clone(),
                    status: outcome.status,
                    record_count: outcome.records.len(),
                    device_error_count: outcome.device_errors.len(),
                    error: outcome.error.clone(),
                    attempts: outcome.attempts,
                    elapsed_ms: outcome.elapsed_ms,
                })
                .collect(),
        }
    }
}
