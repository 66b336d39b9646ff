use imc_forecast::{EventKind, ForecastError, ForecastEvent, forecast};

const DAY_MS: i64 = 86_400_000;

fn two_point_history() -> Vec<(i64, f64)> {
    // 10 个单位/天 的线性增长
    vec![(0, 100.0), (10 * DAY_MS, 200.0)]
}

fn provision(day: i64, amount: f64) -> ForecastEvent {
    ForecastEvent {
        at_ms: day * DAY_MS,
        amount_delta: amount,
        kind: EventKind::Provision,
    }
}

fn recovery(day: i64, amount: f64) -> ForecastEvent {
    ForecastEvent {
        at_ms: day * DAY_MS,
        amount_delta: amount,
        kind: EventKind::Recovery,
    }
}

#[test]
fn base_projection_follows_linear_trend() {
    let table = forecast(&two_point_history(), &[20], &[]).expect("forecast");
    let point = table.get(&20).expect("horizon 20");
    assert!((point.base_projection - 300.0).abs() < 1e-9);
    assert_eq!(point.event_impact, 0.0);
    assert!((point.total - 300.0).abs() < 1e-9);
}

#[test]
fn provision_event_adds_to_total() {
    let table = forecast(&two_point_history(), &[20], &[provision(15, 50.0)]).expect("forecast");
    let point = table.get(&20).expect("horizon 20");
    assert!((point.base_projection - 300.0).abs() < 1e-9);
    assert!((point.event_impact - 50.0).abs() < 1e-9);
    assert!((point.total - 350.0).abs() < 1e-9);
}

#[test]
fn recovery_event_subtracts_from_total() {
    let table = forecast(&two_point_history(), &[20], &[recovery(12, 30.0)]).expect("forecast");
    let point = table.get(&20).expect("horizon 20");
    assert!((point.total - 270.0).abs() < 1e-9);
}

#[test]
fn events_inside_history_window_are_ignored() {
    // 不晚于最后历史点（第 10 天）的事件不参与外推
    let events = vec![provision(5, 500.0), provision(10, 500.0), provision(15, 50.0)];
    let table = forecast(&two_point_history(), &[20], &events).expect("forecast");
    let point = table.get(&20).expect("horizon 20");
    assert!((point.event_impact - 50.0).abs() < 1e-9);
}

#[test]
fn events_beyond_horizon_are_ignored() {
    let events = vec![provision(25, 50.0)];
    let table = forecast(&two_point_history(), &[20, 30], &events).expect("forecast");
    assert_eq!(table.get(&20).expect("horizon 20").event_impact, 0.0);
    assert!((table.get(&30).expect("horizon 30").event_impact - 50.0).abs() < 1e-9);
}

#[test]
fn result_is_independent_of_input_order() {
    let events_a = vec![provision(15, 50.0), recovery(18, 20.0)];
    let events_b = vec![recovery(18, 20.0), provision(15, 50.0)];
    let history_a = two_point_history();
    let mut history_b = two_point_history();
    history_b.reverse();

    let table_a = forecast(&history_a, &[20], &events_a).expect("forecast");
    let table_b = forecast(&history_b, &[20], &events_b).expect("forecast");
    let point_a = table_a.get(&20).expect("horizon");
    let point_b = table_b.get(&20).expect("horizon");
    assert_eq!(point_a.total, point_b.total);
    assert!((point_a.total - 330.0).abs() < 1e-9);
}

#[test]
fn single_point_history_is_rejected() {
    let err = forecast(&[(0, 100.0)], &[20], &[]).expect_err("insufficient");
    assert!(matches!(err, ForecastError::InsufficientHistory));
}

#[test]
fn noisy_history_uses_least_squares_fit() {
    // 围绕 y = 10x + 100 的对称扰动，拟合应回到原直线
    let history = vec![
        (0, 95.0),
        (0, 105.0),
        (5 * DAY_MS, 145.0),
        (5 * DAY_MS, 155.0),
        (10 * DAY_MS, 195.0),
        (10 * DAY_MS, 205.0),
    ];
    let table = forecast(&history, &[20], &[]).expect("forecast");
    let point = table.get(&20).expect("horizon 20");
    assert!((point.base_projection - 300.0).abs() < 1e-6, "got {}", point.base_projection);
}
