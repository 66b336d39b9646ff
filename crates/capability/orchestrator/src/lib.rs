//! 采集调度：有界并发、单元超时、失败隔离与汇合冻结。

use domain::{
    CollectionOutcome, CollectionRun, ErrorDetail, ResultRecord, RunStatus, SourceDescriptor,
    UnitStatus,
};
use imc_adapter::{AdapterRegistry, CollectOutput, SourceAdapter};
use imc_telemetry::{
    record_device_errors, record_records_collected, record_run_completed, record_run_started,
    record_unit_failed, record_unit_latency_ms, record_unit_ok, record_unit_partial,
    record_unit_retry, record_unit_timed_out, record_units_dispatched,
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

/// 汇合阶段在单元预算之外额外等待的固定宽限（毫秒）。
const JOIN_GRACE_MS: u64 = 2_000;

/// 未注册厂商的源组在无功能清单时使用的伪功能名。
const UNKNOWN_FUNCTION: &str = "*";

/// 重试策略：仅对 FAILED/TIMED_OUT 终态生效。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u64,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 0,
        }
    }
}

/// 一次采集运行的调度参数。
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub max_concurrency: usize,
    pub unit_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            unit_timeout_ms: 30_000,
            retry: RetryPolicy::default(),
        }
    }
}

/// 调度错误（仅配置类，预检阶段抛出）。
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("invalid run options: {0}")]
    Configuration(String),
}

struct WorkUnit {
    source: Arc<SourceDescriptor>,
    function: String,
    adapter: Arc<dyn SourceAdapter>,
}

enum AttemptResult {
    Completed(CollectOutput),
    Failed(String),
    TimedOut,
}

/// 采集调度器。adapter 注册表通过构造注入，无环境全局状态。
pub struct Orchestrator {
    registry: Arc<AdapterRegistry>,
}

impl Orchestrator {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self { registry }
    }

    /// 执行一次完整采集通过。
    ///
    /// 每个 (source, function) 对为一个独立单元；单元失败/超时互不影响。
    /// 返回的 CollectionRun 已冻结，包含每个单元的终态。
    pub async fn run_collection(
        &self,
        sources: Vec<SourceDescriptor>,
        functions_per_vendor: &HashMap<String, Vec<String>>,
        options: RunOptions,
    ) -> Result<CollectionRun, OrchestratorError> {
        validate_options(&options)?;
        record_run_started();
        let started_at_ms = now_epoch_ms();

        let mut outcomes: Vec<CollectionOutcome> = Vec::new();
        let mut units: VecDeque<WorkUnit> = VecDeque::new();
        let mut seen_units: HashSet<(String, String)> = HashSet::new();

        for source in sources {
            let source = Arc::new(source);
            match self.registry.lookup(&source.vendor_kind) {
                Ok(adapter) => {
                    // 功能清单：配置优先，缺省回退到 adapter 自述能力
                    let functions = functions_per_vendor
                        .get(&source.vendor_kind)
                        .cloned()
                        .unwrap_or_else(|| adapter.functions());
                    for function in functions {
                        let key = (source.source_id.clone(), function.clone());
                        if !seen_units.insert(key) {
                            continue;
                        }
                        units.push_back(WorkUnit {
                            source: source.clone(),
                            function,
                            adapter: adapter.clone(),
                        });
                    }
                }
                Err(err) => {
                    // 未注册厂商：该源组整体 FAILED，但运行继续
                    warn!(
                        target: "imc.orchestrator",
                        source_id = %source.source_id,
                        vendor_kind = %source.vendor_kind,
                        "source group skipped: {}",
                        err
                    );
                    let functions = functions_per_vendor
                        .get(&source.vendor_kind)
                        .cloned()
                        .unwrap_or_else(|| vec![UNKNOWN_FUNCTION.to_string()]);
                    for function in functions {
                        let key = (source.source_id.clone(), function.clone());
                        if !seen_units.insert(key) {
                            continue;
                        }
                        outcomes.push(failed_outcome(&source, &function, err.to_string()));
                    }
                }
            }
        }

        let unit_count = units.len();
        let expected: Vec<(String, String, String)> = units
            .iter()
            .map(|unit| {
                (
                    unit.source.source_id.clone(),
                    unit.source.vendor_kind.clone(),
                    unit.function.clone(),
                )
            })
            .collect();
        record_units_dispatched(unit_count as u64);
        info!(
            target: "imc.orchestrator",
            units = unit_count,
            skipped_sources = outcomes.len(),
            max_concurrency = options.max_concurrency,
            unit_timeout_ms = options.unit_timeout_ms,
            "run_started"
        );

        if unit_count > 0 {
            let queue = Arc::new(Mutex::new(units));
            let (tx, mut rx) = mpsc::channel::<CollectionOutcome>(unit_count);
            let worker_count = options.max_concurrency.min(unit_count);
            let mut workers = Vec::with_capacity(worker_count);
            for _ in 0..worker_count {
                let queue = queue.clone();
                let tx = tx.clone();
                let retry = options.retry.clone();
                let unit_timeout_ms = options.unit_timeout_ms;
                workers.push(tokio::spawn(async move {
                    loop {
                        let unit = { queue.lock().await.pop_front() };
                        let Some(unit) = unit else { break };
                        let outcome = execute_unit(unit, unit_timeout_ms, &retry).await;
                        if tx.send(outcome).await.is_err() {
                            break;
                        }
                    }
                }));
            }
            drop(tx);

            // 全局截止：单元预算 * (1 + 重试) + 退避 + 固定宽限
            let deadline = run_deadline(&options);
            let mut received: Vec<CollectionOutcome> = Vec::with_capacity(unit_count);
            let _ = tokio::time::timeout(deadline, async {
                while let Some(outcome) = rx.recv().await {
                    received.push(outcome);
                    if received.len() == unit_count {
                        break;
                    }
                }
            })
            .await;
            for worker in &workers {
                worker.abort();
            }

            // 截止后仍未报告的单元强制记为 TIMED_OUT
            let done: HashSet<(String, String)> = received
                .iter()
                .map(|outcome| (outcome.source_id.clone(), outcome.function_name.clone()))
                .collect();
            for (source_id, vendor_kind, function) in expected {
                if done.contains(&(source_id.clone(), function.clone())) {
                    continue;
                }
                warn!(
                    target: "imc.orchestrator",
                    source_id = %source_id,
                    function = %function,
                    "unit_forced_timeout"
                );
                record_unit_timed_out();
                received.push(CollectionOutcome {
                    source_id,
                    vendor_kind,
                    function_name: function,
                    status: UnitStatus::TimedOut,
                    records: Vec::new(),
                    device_errors: BTreeMap::new(),
                    error: Some("global run deadline exceeded".to_string()),
                    attempts: 0,
                    elapsed_ms: deadline.as_millis() as u64,
                });
            }
            outcomes.append(&mut received);
        }

        let run_status = RunStatus::from_outcomes(&outcomes);
        let run = CollectionRun {
            started_at_ms,
            finished_at_ms: now_epoch_ms(),
            run_status,
            outcomes,
        };
        record_run_completed();
        info!(
            target: "imc.orchestrator",
            outcomes = run.outcomes.len(),
            run_status = ?run.run_status,
            elapsed_ms = run.finished_at_ms.saturating_sub(run.started_at_ms),
            "run_frozen"
        );
        Ok(run)
    }
}

fn validate_options(options: &RunOptions) -> Result<(), OrchestratorError> {
    if options.max_concurrency < 1 {
        return Err(OrchestratorError::Configuration(format!(
            "max_concurrency must be >= 1, got {}",
            options.max_concurrency
        )));
    }
    if options.unit_timeout_ms == 0 {
        return Err(OrchestratorError::Configuration(
            "unit_timeout_ms must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn run_deadline(options: &RunOptions) -> Duration {
    let retries = options.retry.max_retries;
    let budget = options
        .unit_timeout_ms
        .saturating_mul(1 + retries)
        .saturating_add(options.retry.backoff_ms.saturating_mul(retries))
        .saturating_add(JOIN_GRACE_MS);
    Duration::from_millis(budget)
}

async fn execute_unit(
    unit: WorkUnit,
    unit_timeout_ms: u64,
    retry: &RetryPolicy,
) -> CollectionOutcome {
    let started = Instant::now();
    let mut attempt: u64 = 0;
    let result = loop {
        attempt += 1;
        let result = run_attempt(&unit, unit_timeout_ms).await;
        let retryable = matches!(result, AttemptResult::Failed(_) | AttemptResult::TimedOut);
        if retryable && attempt <= retry.max_retries {
            record_unit_retry();
            warn!(
                target: "imc.orchestrator",
                source_id = %unit.source.source_id,
                function = %unit.function,
                attempt = attempt,
                "unit_retry"
            );
            if retry.backoff_ms > 0 {
                tokio::time::sleep(Duration::from_millis(retry.backoff_ms)).await;
            }
            continue;
        }
        break result;
    };
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let outcome = match result {
        AttemptResult::Completed(output) => outcome_from_output(&unit, output, attempt, elapsed_ms),
        AttemptResult::Failed(message) => CollectionOutcome {
            source_id: unit.source.source_id.clone(),
            vendor_kind: unit.source.vendor_kind.clone(),
            function_name: unit.function.clone(),
            status: UnitStatus::Failed,
            records: Vec::new(),
            device_errors: BTreeMap::new(),
            error: Some(message),
            attempts: attempt,
            elapsed_ms,
        },
        AttemptResult::TimedOut => CollectionOutcome {
            source_id: unit.source.source_id.clone(),
            vendor_kind: unit.source.vendor_kind.clone(),
            function_name: unit.function.clone(),
            status: UnitStatus::TimedOut,
            records: Vec::new(),
            device_errors: BTreeMap::new(),
            error: Some(format!("unit timeout of {}ms exceeded", unit_timeout_ms)),
            attempts: attempt,
            elapsed_ms,
        },
    };

    match outcome.status {
        UnitStatus::Ok => record_unit_ok(),
        UnitStatus::Partial => record_unit_partial(),
        UnitStatus::Failed => record_unit_failed(),
        UnitStatus::TimedOut => record_unit_timed_out(),
    }
    record_unit_latency_ms(elapsed_ms);
    record_records_collected(outcome.records.len() as u64);
    record_device_errors(outcome.device_errors.len() as u64);
    info!(
        target: "imc.orchestrator",
        source_id = %outcome.source_id,
        function = %outcome.function_name,
        status = ?outcome.status,
        records = outcome.records.len(),
        device_errors = outcome.device_errors.len(),
        attempts = outcome.attempts,
        elapsed_ms = outcome.elapsed_ms,
        "unit_completed"
    );
    outcome
}

/// 单次尝试：独立 task 包住 adapter panic，超时 abort 实现尽力取消。
async fn run_attempt(unit: &WorkUnit, unit_timeout_ms: u64) -> AttemptResult {
    let adapter = unit.adapter.clone();
    let source = unit.source.clone();
    let function = unit.function.clone();
    let mut handle = tokio::spawn(async move { adapter.collect(&source, &function).await });
    match tokio::time::timeout(Duration::from_millis(unit_timeout_ms), &mut handle).await {
        Ok(Ok(Ok(output))) => AttemptResult::Completed(output),
        Ok(Ok(Err(err))) => AttemptResult::Failed(err.to_string()),
        Ok(Err(join_err)) => AttemptResult::Failed(format!("adapter task crashed: {}", join_err)),
        Err(_) => {
            handle.abort();
            AttemptResult::TimedOut
        }
    }
}

fn outcome_from_output(
    unit: &WorkUnit,
    output: CollectOutput,
    attempts: u64,
    elapsed_ms: u64,
) -> CollectionOutcome {
    let status = classify_output(&output.records, &output.device_errors);
    let error = match status {
        UnitStatus::Failed => Some("all devices reported errors".to_string()),
        _ => None,
    };
    CollectionOutcome {
        source_id: unit.source.source_id.clone(),
        vendor_kind: unit.source.vendor_kind.clone(),
        function_name: unit.function.clone(),
        status,
        records: output.records,
        device_errors: output.device_errors,
        error,
        attempts,
        elapsed_ms,
    }
}

fn classify_output(
    records: &[ResultRecord],
    device_errors: &BTreeMap<String, ErrorDetail>,
) -> UnitStatus {
    if device_errors.is_empty() {
        UnitStatus::Ok
    } else if records.is_empty() {
        UnitStatus::Failed
    } else {
        UnitStatus::Partial
    }
}

fn failed_outcome(
    source: &SourceDescriptor,
    function: &str,
    message: String,
) -> CollectionOutcome {
    record_unit_failed();
    CollectionOutcome {
        source_id: source.source_id.clone(),
        vendor_kind: source.vendor_kind.clone(),
        function_name: function.to_string(),
        status: UnitStatus::Failed,
        records: Vec::new(),
        device_errors: BTreeMap::new(),
        error: Some(message),
        attempts: 0,
        elapsed_ms: 0,
    }
}

fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
