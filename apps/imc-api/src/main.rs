//! 采集触发 HTTP API（健康检查/采集通过）与请求追踪 ID。

use api_contract::{
    ApiResponse, CollectRequest, ForecastEventDto, ForecastRequestDto, RunOptionsDto,
    RunSummaryDto,
};
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use imc_aggregate::{AggregateReport, aggregate};
use imc_config::AppConfig;
use imc_forecast::{EventKind, ForecastEvent, ForecastTable, forecast};
use imc_orchestrator::{Orchestrator, OrchestratorError, RetryPolicy, RunOptions};
use imc_telemetry::{init_tracing, new_request_ids};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

mod registry;

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
    defaults: RunOptions,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // adapter 注册表（传输通道按配置选择）
    let registry = Arc::new(registry::build_registry(&config));
    let orchestrator = Arc::new(Orchestrator::new(registry));
    let defaults = RunOptions {
        max_concurrency: config.max_concurrency,
        unit_timeout_ms: config.unit_timeout_ms,
        retry: RetryPolicy {
            max_retries: config.retry_max_retries,
            backoff_ms: config.retry_backoff_ms,
        },
    };
    let state = AppState {
        orchestrator,
        defaults,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/collect", post(collect))
        .with_state(state)
        // 注入 request_id/trace_id + HTTP span
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_context)),
        );

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

/// 采集响应：运行摘要 + 聚合报表。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectResponse {
    run: RunSummaryDto,
    report: AggregateReport,
}

async fn collect(State(state): State<AppState>, Json(request): Json<CollectRequest>) -> Response {
    // 预测输入独立于采集通过，先行校验，避免坏请求白跑一轮采集
    let forecast_table = match request.forecast {
        Some(forecast_request) => match run_forecast(forecast_request) {
            Ok(table) => Some(table),
            Err(response) => return response,
        },
        None => None,
    };

    let sources = request
        .sources
        .into_iter()
        .map(|source| source.into_domain())
        .collect();
    let options = merge_options(&state.defaults, request.options.as_ref());

    let run = match state
        .orchestrator
        .run_collection(sources, &request.functions_per_vendor, options)
        .await
    {
        Ok(run) => run,
        Err(err @ OrchestratorError::Configuration(_)) => {
            return bad_request("COLLECT.BAD_OPTIONS", err.to_string());
        }
    };

    let mut report = aggregate(&run);
    if let Some(table) = forecast_table {
        report = report.with_forecast(table);
    }
    let response = CollectResponse {
        run: RunSummaryDto::from_run(&run),
        report,
    };
    (StatusCode::OK, Json(ApiResponse::success(response))).into_response()
}

fn run_forecast(request: ForecastRequestDto) -> Result<ForecastTable, Response> {
    let history: Vec<(i64, f64)> = request
        .history
        .iter()
        .map(|point| (point.ts_ms, point.value))
        .collect();
    let mut events = Vec::with_capacity(request.events.len());
    for event in request.events {
        match parse_event(event) {
            Ok(event) => events.push(event),
            Err(message) => return Err(bad_request("FORECAST.BAD_EVENT_KIND", message)),
        }
    }
    forecast(&history, &request.horizon_days, &events)
        .map_err(|err| bad_request("FORECAST.INSUFFICIENT_HISTORY", err.to_string()))
}

fn parse_event(dto: ForecastEventDto) -> Result<ForecastEvent, String> {
    let kind = match dto.kind.to_ascii_lowercase().as_str() {
        "provision" => EventKind::Provision,
        "recovery" => EventKind::Recovery,
        other => return Err(format!("unknown event kind: {}", other)),
    };
    Ok(ForecastEvent {
        at_ms: dto.at_ms,
        amount_delta: dto.amount_delta,
        kind,
    })
}

fn merge_options(defaults: &RunOptions, dto: Option<&RunOptionsDto>) -> RunOptions {
    let Some(dto) = dto else {
        return defaults.clone();
    };
    RunOptions {
        max_concurrency: dto.max_concurrency.unwrap_or(defaults.max_concurrency),
        unit_timeout_ms: dto.unit_timeout_ms.unwrap_or(defaults.unit_timeout_ms),
        retry: RetryPolicy {
            max_retries: dto.max_retries.unwrap_or(defaults.retry.max_retries),
            backoff_ms: dto.backoff_ms.unwrap_or(defaults.retry.backoff_ms),
        },
    }
}

fn bad_request(code: &str, message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(code, message)),
    )
        .into_response()
}

async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    // 生成 request_id 与 trace_id，并注入请求扩展与日志
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}
