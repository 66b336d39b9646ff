use domain::{
    CollectionOutcome, CollectionRun, ErrorDetail, FieldValue, ResultRecord, RunStatus, UnitStatus,
};
use imc_aggregate::aggregate;
use imc_forecast::{EventKind, ForecastEvent, forecast};
use std::collections::BTreeMap;

fn record(
    source_id: &str,
    vendor_kind: &str,
    function: &str,
    device_id: Option<&str>,
    fields: &[(&str, FieldValue)],
) -> ResultRecord {
    ResultRecord {
        source_id: source_id.to_string(),
        vendor_kind: vendor_kind.to_string(),
        function_name: function.to_string(),
        device_id: device_id.map(|id| id.to_string()),
        collected_at_ms: 1_700_000_000_000,
        fields: fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect(),
    }
}

fn outcome(
    source_id: &str,
    vendor_kind: &str,
    function: &str,
    status: UnitStatus,
    records: Vec<ResultRecord>,
) -> CollectionOutcome {
    CollectionOutcome {
        source_id: source_id.to_string(),
        vendor_kind: vendor_kind.to_string(),
        function_name: function.to_string(),
        status,
        records,
        device_errors: BTreeMap::new(),
        error: None,
        attempts: 1,
        elapsed_ms: 10,
    }
}

fn mixed_run() -> CollectionRun {
    let array_capacity = outcome(
        "array-group",
        "storage-array",
        "capacity",
        UnitStatus::Ok,
        vec![
            record(
                "array-group",
                "storage-array",
                "capacity",
                Some("array-01"),
                &[
                    ("total_capacity_gb", FieldValue::I64(100)),
                    ("health", FieldValue::String("ok".to_string())),
                    ("last_scrub_at", FieldValue::TimestampMs(1_699_900_000_000)),
                ],
            ),
            record(
                "array-group",
                "storage-array",
                "capacity",
                Some("array-02"),
                &[("total_capacity_gb", FieldValue::I64(250))],
            ),
        ],
    );
    let array_health = outcome(
        "array-group",
        "storage-array",
        "health",
        UnitStatus::Ok,
        vec![record(
            "array-group",
            "storage-array",
            "health",
            Some("array-01"),
            &[("health", FieldValue::String("ok".to_string()))],
        )],
    );
    let switch_capacity = outcome(
        "switch-group",
        "fc-switch",
        "capacity",
        UnitStatus::Ok,
        vec![record(
            "switch-group",
            "fc-switch",
            "capacity",
            Some("switch-01"),
            &[
                ("capacity", FieldValue::I64(200)),
                ("port_count", FieldValue::I64(48)),
            ],
        )],
    );
    let mut backup_failed = outcome(
        "backup-group",
        "backup-server",
        "capacity",
        UnitStatus::Failed,
        Vec::new(),
    );
    backup_failed.error = Some("vendor endpoint unreachable".to_string());
    backup_failed
        .device_errors
        .insert("backup-01".to_string(), ErrorDetail::new("unreachable"));

    CollectionRun {
        started_at_ms: 1_700_000_000_000,
        finished_at_ms: 1_700_000_060_000,
        run_status: RunStatus::Degraded,
        outcomes: vec![array_capacity, array_health, switch_capacity, backup_failed],
    }
}

#[test]
fn capacity_rows_keep_original_field_names_without_cross_contamination() {
    let report = aggregate(&mixed_run());

    let array_rows: Vec<_> = report
        .capacity
        .iter()
        .filter(|row| row.source_id == "array-group")
        .collect();
    assert_eq!(array_rows.len(), 2);
    assert_eq!(
        array_rows[0].fields.get("total_capacity_gb"),
        Some(&FieldValue::I64(100))
    );
    // 未命中的字段不进入容量行
    assert!(!array_rows[0].fields.contains_key("health"));
    assert!(!array_rows[0].fields.contains_key("last_scrub_at"));

    let switch_rows: Vec<_> = report
        .capacity
        .iter()
        .filter(|row| row.source_id == "switch-group")
        .collect();
    assert_eq!(switch_rows.len(), 1);
    assert_eq!(
        switch_rows[0].fields.get("capacity"),
        Some(&FieldValue::I64(200))
    );
    assert!(!switch_rows[0].fields.contains_key("port_count"));
    assert!(!switch_rows[0].fields.contains_key("total_capacity_gb"));
}

#[test]
fn aggregate_is_deterministic_under_outcome_shuffle() {
    let run = mixed_run();
    let mut shuffled = run.clone();
    shuffled.outcomes.reverse();
    let mut rotated = run.clone();
    rotated.outcomes.rotate_left(2);

    let baseline = serde_json::to_string(&aggregate(&run)).expect("json");
    let from_shuffled = serde_json::to_string(&aggregate(&shuffled)).expect("json");
    let from_rotated = serde_json::to_string(&aggregate(&rotated)).expect("json");
    assert_eq!(baseline, from_shuffled);
    assert_eq!(baseline, from_rotated);
}

#[test]
fn device_rollup_counts_functions_with_data() {
    let report = aggregate(&mixed_run());

    let array_01 = report.devices.get("array-01").expect("array-01");
    assert_eq!(array_01.function_count, 2);
    assert!(array_01.functions.contains("capacity"));
    assert!(array_01.functions.contains("health"));

    let array_02 = report.devices.get("array-02").expect("array-02");
    assert_eq!(array_02.function_count, 1);

    // 无任何记录的设备不出现
    assert!(!report.devices.contains_key("backup-01"));
}

#[test]
fn vendor_rollup_lists_failed_sources_with_status() {
    let report = aggregate(&mixed_run());

    let backup = report.vendors.get("backup-group").expect("backup listed");
    assert_eq!(backup.vendor_kind, "backup-server");
    assert_eq!(backup.record_count, 0);
    assert_eq!(backup.device_count, 0);
    assert!(backup.functions_with_data.is_empty());
    assert_eq!(
        backup.unit_statuses.get("capacity"),
        Some(&UnitStatus::Failed)
    );

    let array = report.vendors.get("array-group").expect("array listed");
    assert_eq!(array.record_count, 3);
    assert_eq!(array.device_count, 2);
    assert_eq!(array.functions_with_data.len(), 2);
}

#[test]
fn report_attaches_forecast_table() {
    const DAY_MS: i64 = 86_400_000;
    let history = vec![(0, 100.0), (10 * DAY_MS, 200.0)];
    let events = vec![ForecastEvent {
        at_ms: 15 * DAY_MS,
        amount_delta: 50.0,
        kind: EventKind::Provision,
    }];
    let table = forecast(&history, &[20], &events).expect("forecast");

    let report = aggregate(&mixed_run()).with_forecast(table);
    let table = report.forecast.expect("forecast attached");
    assert!((table.get(&20).expect("horizon").total - 350.0).abs() < 1e-9);
}
