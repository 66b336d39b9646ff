//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 设备传输通道选择。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// 本机 ssh 子进程。
    Ssh,
    /// 预置应答（演示/联调）。
    Scripted,
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub max_concurrency: usize,
    pub unit_timeout_ms: u64,
    pub retry_max_retries: u64,
    pub retry_backoff_ms: u64,
    pub transport: TransportKind,
    pub ssh_user: String,
    pub ssh_port: u16,
    pub ssh_connect_timeout_secs: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("IMC_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let max_concurrency = read_usize_with_default("IMC_MAX_CONCURRENCY", 4)?;
        let unit_timeout_ms = read_u64_with_default("IMC_UNIT_TIMEOUT_MS", 30_000)?;
        let retry_max_retries = read_u64_with_default("IMC_RETRY_MAX_RETRIES", 0)?;
        let retry_backoff_ms = read_u64_with_default("IMC_RETRY_BACKOFF_MS", 200)?;
        let transport = read_transport_with_default("IMC_TRANSPORT", TransportKind::Ssh)?;
        let ssh_user = env::var("IMC_SSH_USER").unwrap_or_else(|_| "monitor".to_string());
        let ssh_port = read_u16_with_default("IMC_SSH_PORT", 22)?;
        let ssh_connect_timeout_secs = read_u64_with_default("IMC_SSH_CONNECT_TIMEOUT_SECONDS", 10)?;

        Ok(Self {
            http_addr,
            max_concurrency,
            unit_timeout_ms,
            retry_max_retries,
            retry_backoff_ms,
            transport,
            ssh_user,
            ssh_port,
            ssh_connect_timeout_secs,
        })
    }
}

fn read_usize_with_default(key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<usize>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_transport_with_default(
    key: &str,
    default: TransportKind,
) -> Result<TransportKind, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    match value.to_ascii_lowercase().as_str() {
        "ssh" => Ok(TransportKind::Ssh),
        "scripted" => Ok(TransportKind::Scripted),
        _ => Err(ConfigError::Invalid(key.to_string(), value)),
    }
}
