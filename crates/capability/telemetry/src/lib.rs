//! 追踪与运行指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 采集运行指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub runs_started: u64,
    pub runs_completed: u64,
    pub units_dispatched: u64,
    pub units_ok: u64,
    pub units_partial: u64,
    pub units_failed: u64,
    pub units_timed_out: u64,
    pub unit_retries: u64,
    pub records_collected: u64,
    pub device_errors: u64,
    pub unit_latency_ms_total: u64,
    pub unit_latency_ms_count: u64,
}

/// 采集运行指标。
pub struct RunMetrics {
    runs_started: AtomicU64,
    runs_completed: AtomicU64,
    units_dispatched: AtomicU64,
    units_ok: AtomicU64,
    units_partial: AtomicU64,
    units_failed: AtomicU64,
    units_timed_out: AtomicU64,
    unit_retries: AtomicU64,
    records_collected: AtomicU64,
    device_errors: AtomicU64,
    unit_latency_ms_total: AtomicU64,
    unit_latency_ms_count: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            units_dispatched: AtomicU64::new(0),
            units_ok: AtomicU64::new(0),
            units_partial: AtomicU64::new(0),
            units_failed: AtomicU64::new(0),
            units_timed_out: AtomicU64::new(0),
            unit_retries: AtomicU64::new(0),
            records_collected: AtomicU64::new(0),
            device_errors: AtomicU64::new(0),
            unit_latency_ms_total: AtomicU64::new(0),
            unit_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            units_dispatched: self.units_dispatched.load(Ordering::Relaxed),
            units_ok: self.units_ok.load(Ordering::Relaxed),
            units_partial: self.units_partial.load(Ordering::Relaxed),
            units_failed: self.units_failed.load(Ordering::Relaxed),
            units_timed_out: self.units_timed_out.load(Ordering::Relaxed),
            unit_retries: self.unit_retries.load(Ordering::Relaxed),
            records_collected: self.records_collected.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            unit_latency_ms_total: self.unit_latency_ms_total.load(Ordering::Relaxed),
            unit_latency_ms_count: self.unit_latency_ms_count.load(Ordering::Relaxed),
        }
    }
}

static METRICS: OnceLock<RunMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static RunMetrics {
    METRICS.get_or_init(RunMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录一次采集运行开始。
pub fn record_run_started() {
    metrics().runs_started.fetch_add(1, Ordering::Relaxed);
}

/// 记录一次采集运行冻结完成。
pub fn record_run_completed() {
    metrics().runs_completed.fetch_add(1, Ordering::Relaxed);
}

/// 记录派发的采集单元数。
pub fn record_units_dispatched(count: u64) {
    metrics().units_dispatched.fetch_add(count, Ordering::Relaxed);
}

/// 记录单元终态 OK。
pub fn record_unit_ok() {
    metrics().units_ok.fetch_add(1, Ordering::Relaxed);
}

/// 记录单元终态 PARTIAL。
pub fn record_unit_partial() {
    metrics().units_partial.fetch_add(1, Ordering::Relaxed);
}

/// 记录单元终态 FAILED。
pub fn record_unit_failed() {
    metrics().units_failed.fetch_add(1, Ordering::Relaxed);
}

/// 记录单元终态 TIMED_OUT。
pub fn record_unit_timed_out() {
    metrics().units_timed_out.fetch_add(1, Ordering::Relaxed);
}

/// 记录单元重试次数。
pub fn record_unit_retry() {
    metrics().unit_retries.fetch_add(1, Ordering::Relaxed);
}

/// 记录采集到的记录条数。
pub fn record_records_collected(count: u64) {
    metrics().records_collected.fetch_add(count, Ordering::Relaxed);
}

/// 记录设备级错误条数。
pub fn record_device_errors(count: u64) {
    metrics().device_errors.fetch_add(count, Ordering::Relaxed);
}

/// 记录单元耗时（毫秒，含重试）。
pub fn record_unit_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .unit_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .unit_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}
