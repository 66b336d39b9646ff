//! 聚合引擎：把冻结的采集运行归并为跨厂商汇总报表。
//!
//! 纯函数、无 I/O：同一运行不论单元完成顺序如何，输出字节级一致
//! （先按 (source_id, function_name) 排序，分组结构全部用 BTree）。

use domain::{CollectionOutcome, CollectionRun, FieldValue, UnitStatus};
use imc_forecast::ForecastTable;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// 容量字段识别的优先模式列表（小写子串匹配，靠前优先）。
///
/// 尽力而为的启发式：各厂商字段名互不一致且没有权威字典，
/// 匹配到的字段按原始字段名保留，不做跨厂商改名。
pub const CAPACITY_FIELD_PATTERNS: &[&str] = &["capacity", "used", "free", "size"];

/// 容量汇总行：仅携带命中的字段。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityRow {
    pub source_id: String,
    pub function_name: String,
    pub device_id: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
}

/// 设备级 rollup。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRollup {
    pub functions: BTreeSet<String>,
    pub function_count: usize,
}

/// 厂商（源）级 rollup。全失败的源也会列出，便于区分
/// “没有容量”与“采集失败”。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorRollup {
    pub vendor_kind: String,
    pub record_count: usize,
    pub device_count: usize,
    pub functions_with_data: BTreeSet<String>,
    pub unit_statuses: BTreeMap<String, UnitStatus>,
}

/// 派生报表：整体由冻结运行重新生成，从不原地修改。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub capacity: Vec<CapacityRow>,
    pub devices: BTreeMap<String, DeviceRollup>,
    pub vendors: BTreeMap<String, VendorRollup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<ForecastTable>,
}

impl AggregateReport {
    /// 附加调用方算好的容量预测。
    pub fn with_forecast(mut self, forecast: ForecastTable) -> Self {
        self.forecast = Some(forecast);
        self
    }
}

/// 聚合一次冻结的采集运行。部分失败的单元只缺对应数据，不影响整体。
pub fn aggregate(run: &CollectionRun) -> AggregateReport {
    let mut outcomes: Vec<&CollectionOutcome> = run.outcomes.iter().collect();
    outcomes.sort_by(|a, b| {
        (a.source_id.as_str(), a.function_name.as_str())
            .cmp(&(b.source_id.as_str(), b.function_name.as_str()))
    });

    let mut capacity: Vec<CapacityRow> = Vec::new();
    let mut devices: BTreeMap<String, DeviceRollup> = BTreeMap::new();
    let mut vendors: BTreeMap<String, VendorRollup> = BTreeMap::new();
    let mut vendor_devices: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for outcome in outcomes {
        let vendor = vendors
            .entry(outcome.source_id.clone())
            .or_insert_with(|| VendorRollup {
                vendor_kind: outcome.vendor_kind.clone(),
                record_count: 0,
                device_count: 0,
                functions_with_data: BTreeSet::new(),
                unit_statuses: BTreeMap::new(),
            });
        vendor
            .unit_statuses
            .insert(outcome.function_name.clone(), outcome.status);
        vendor.record_count += outcome.records.len();
        if !outcome.records.is_empty() {
            vendor
                .functions_with_data
                .insert(outcome.function_name.clone());
        }

        for record in &outcome.records {
            if let Some(device_id) = &record.device_id {
                vendor_devices
                    .entry(outcome.source_id.clone())
                    .or_default()
                    .insert(device_id.clone());
                devices
                    .entry(device_id.clone())
                    .or_insert_with(|| DeviceRollup {
                        functions: BTreeSet::new(),
                        function_count: 0,
                    })
                    .functions
                    .insert(record.function_name.clone());
            }
            let matched = capacity_fields(&record.fields);
            if !matched.is_empty() {
                capacity.push(CapacityRow {
                    source_id: record.source_id.clone(),
                    function_name: record.function_name.clone(),
                    device_id: record.device_id.clone(),
                    fields: matched,
                });
            }
        }
    }

    for (source_id, device_ids) in vendor_devices {
        if let Some(vendor) = vendors.get_mut(&source_id) {
            vendor.device_count = device_ids.len();
        }
    }
    for rollup in devices.values_mut() {
        rollup.function_count = rollup.functions.len();
    }

    AggregateReport {
        capacity,
        devices,
        vendors,
        forecast: None,
    }
}

/// 字段名是否命中容量模式。
pub fn field_matches_capacity(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    CAPACITY_FIELD_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
}

fn capacity_fields(fields: &BTreeMap<String, FieldValue>) -> BTreeMap<String, FieldValue> {
    fields
        .iter()
        .filter(|(name, _)| field_matches_capacity(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_patterns_match_case_insensitive_substrings() {
        assert!(field_matches_capacity("total_capacity_gb"));
        assert!(field_matches_capacity("capacity"));
        assert!(field_matches_capacity("used_gb"));
        assert!(field_matches_capacity("Free_Space"));
        assert!(field_matches_capacity("SIZE"));
        assert!(!field_matches_capacity("health"));
        assert!(!field_matches_capacity("port_count"));
    }
}
