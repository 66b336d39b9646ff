use serde::Serialize;
use std::collections::BTreeMap;

/// 采集记录的标量值。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    I64(i64),
    F64(f64),
    Bool(bool),
    String(String),
    TimestampMs(i64),
}

/// 一条规范化采集记录。字段集合因厂商/功能而异，这是预期行为。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub source_id: String,
    pub vendor_kind: String,
    pub function_name: String,
    /// None 表示源级记录（不归属任何单台设备）。
    pub device_id: Option<String>,
    pub collected_at_ms: i64,
    pub fields: BTreeMap<String, FieldValue>,
}

/// 设备级错误详情（以数据形式承载，不向外抛出）。
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub message: String,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 采集单元的终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Ok,
    Partial,
    Failed,
    TimedOut,
}

impl UnitStatus {
    /// 终态是否产出了可用数据（Ok 或 Partial）。
    pub fn produced_data(self) -> bool {
        matches!(self, UnitStatus::Ok | UnitStatus::Partial)
    }
}

/// 一个 (source, function) 采集单元的终态结果。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionOutcome {
    pub source_id: String,
    pub vendor_kind: String,
    pub function_name: String,
    pub status: UnitStatus,
    pub records: Vec<ResultRecord>,
    pub device_errors: BTreeMap<String, ErrorDetail>,
    /// 单元级失败原因（adapter 报错、panic、超时等）。
    pub error: Option<String>,
    pub attempts: u64,
    pub elapsed_ms: u64,
}

/// 整个采集通过的状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Degraded,
    Failed,
}

impl RunStatus {
    /// 由全部单元终态推导运行状态。
    pub fn from_outcomes(outcomes: &[CollectionOutcome]) -> Self {
        if outcomes.is_empty() {
            return RunStatus::Ok;
        }
        if outcomes
            .iter()
            .all(|outcome| outcome.status == UnitStatus::Ok)
        {
            return RunStatus::Ok;
        }
        if outcomes
            .iter()
            .any(|outcome| outcome.status.produced_data())
        {
            return RunStatus::Degraded;
        }
        RunStatus::Failed
    }
}

/// 一次完整采集通过。冻结后只读，由调度器整体移交。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRun {
    pub started_at_ms: i64,
    pub finished_at_ms: i64,
    pub run_status: RunStatus,
    pub outcomes: Vec<CollectionOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: UnitStatus) -> CollectionOutcome {
        CollectionOutcome {
            source_id: "src-1".to_string(),
            vendor_kind: "array".to_string(),
            function_name: "capacity".to_string(),
            status,
            records: Vec::new(),
            device_errors: BTreeMap::new(),
            error: None,
            attempts: 1,
            elapsed_ms: 0,
        }
    }

    #[test]
    fn run_status_all_ok() {
        let outcomes = vec![outcome(UnitStatus::Ok), outcome(UnitStatus::Ok)];
        assert_eq!(RunStatus::from_outcomes(&outcomes), RunStatus::Ok);
    }

    #[test]
    fn run_status_degraded_when_partial_data() {
        let outcomes = vec![outcome(UnitStatus::Ok), outcome(UnitStatus::TimedOut)];
        assert_eq!(RunStatus::from_outcomes(&outcomes), RunStatus::Degraded);
        let outcomes = vec![outcome(UnitStatus::Partial), outcome(UnitStatus::Failed)];
        assert_eq!(RunStatus::from_outcomes(&outcomes), RunStatus::Degraded);
    }

    #[test]
    fn run_status_failed_when_no_data() {
        let outcomes = vec![outcome(UnitStatus::Failed), outcome(UnitStatus::TimedOut)];
        assert_eq!(RunStatus::from_outcomes(&outcomes), RunStatus::Failed);
    }

    #[test]
    fn field_value_serializes_as_plain_scalar() {
        let value = serde_json::to_value(FieldValue::F64(1.5)).expect("json");
        assert_eq!(value, serde_json::json!(1.5));
        let value = serde_json::to_value(FieldValue::String("x".to_string())).expect("json");
        assert_eq!(value, serde_json::json!("x"));
    }
}
