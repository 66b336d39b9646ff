//! 容量预测：历史趋势线性拟合 + 已知未来事件注入。

use serde::Serialize;
use std::collections::BTreeMap;

const DAY_MS: f64 = 86_400_000.0;

/// 预测错误。
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("insufficient history: need at least two points with distinct timestamps")]
    InsufficientHistory,
}

/// 已知未来事件类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// 计划扩容：正向贡献。
    Provision,
    /// 计划回收：负向贡献。
    Recovery,
}

/// 调用方提供的已知未来变化事件。
#[derive(Debug, Clone)]
pub struct ForecastEvent {
    pub at_ms: i64,
    /// 变化幅度（非负；符号由 kind 决定）。
    pub amount_delta: f64,
    pub kind: EventKind,
}

impl ForecastEvent {
    fn signed_delta(&self) -> f64 {
        match self.kind {
            EventKind::Provision => self.amount_delta,
            EventKind::Recovery => -self.amount_delta,
        }
    }
}

/// 单个预测地平线上的结果。
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    pub base_projection: f64,
    pub event_impact: f64,
    pub total: f64,
}

/// 地平线（距首个历史点的天数）到预测点的映射。
pub type ForecastTable = BTreeMap<u32, ForecastPoint>;

/// 将单一跟踪指标按历史趋势外推到各地平线。
///
/// - 基线：value 对“距首个历史点的天数”做最小二乘线性拟合
/// - 事件影响：所有晚于最后历史点、且不晚于该地平线的事件带符号求和
/// - 无状态，history/events 内部排序，结果与传入顺序无关
pub fn forecast(
    history: &[(i64, f64)],
    horizon_days: &[u32],
    events: &[ForecastEvent],
) -> Result<ForecastTable, ForecastError> {
    if history.len() < 2 {
        return Err(ForecastError::InsufficientHistory);
    }
    let mut history: Vec<(i64, f64)> = history.to_vec();
    history.sort_by(|a, b| a.0.cmp(&b.0));
    let first_ts = history[0].0;
    let last_ts = history[history.len() - 1].0;

    let points: Vec<(f64, f64)> = history
        .iter()
        .map(|(ts_ms, value)| (((ts_ms - first_ts) as f64) / DAY_MS, *value))
        .collect();
    let (slope, intercept) = linear_fit(&points)?;

    let mut events: Vec<ForecastEvent> = events.to_vec();
    events.sort_by(|a, b| a.at_ms.cmp(&b.at_ms));

    let mut table = ForecastTable::new();
    for &day in horizon_days {
        let base_projection = intercept + slope * day as f64;
        let event_impact: f64 = events
            .iter()
            .filter(|event| event.at_ms > last_ts)
            .filter(|event| ((event.at_ms - first_ts) as f64) / DAY_MS <= day as f64)
            .map(ForecastEvent::signed_delta)
            .sum();
        table.insert(
            day,
            ForecastPoint {
                base_projection,
                event_impact,
                total: base_projection + event_impact,
            },
        );
    }
    Ok(table)
}

/// 普通最小二乘：返回 (slope, intercept)。
///
/// 时间轴零方差（全部点同一时刻）视为历史不足。
fn linear_fit(points: &[(f64, f64)]) -> Result<(f64, f64), ForecastError> {
    let n = points.len() as f64;
    let mean_x: f64 = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y: f64 = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let variance: f64 = points
        .iter()
        .map(|(x, _)| (x - mean_x) * (x - mean_x))
        .sum();
    if variance == 0.0 {
        return Err(ForecastError::InsufficientHistory);
    }
    let covariance: f64 = points
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let slope = covariance / variance;
    let intercept = mean_y - slope * mean_x;
    Ok((slope, intercept))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_fit_recovers_exact_line() {
        let points = vec![(0.0, 100.0), (10.0, 200.0)];
        let (slope, intercept) = linear_fit(&points).expect("fit");
        assert!((slope - 10.0).abs() < 1e-9);
        assert!((intercept - 100.0).abs() < 1e-9);
    }

    #[test]
    fn linear_fit_rejects_zero_time_variance() {
        let points = vec![(5.0, 100.0), (5.0, 200.0)];
        assert!(matches!(
            linear_fit(&points),
            Err(ForecastError::InsufficientHistory)
        ));
    }
}
