use imc_config::{AppConfig, TransportKind};

#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("IMC_HTTP_ADDR", "127.0.0.1:8081");
        std::env::set_var("IMC_MAX_CONCURRENCY", "8");
        std::env::set_var("IMC_UNIT_TIMEOUT_MS", "5000");
        std::env::set_var("IMC_TRANSPORT", "scripted");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:8081");
    assert_eq!(config.max_concurrency, 8);
    assert_eq!(config.unit_timeout_ms, 5000);
    assert_eq!(config.transport, TransportKind::Scripted);
    // 未设置的键取默认值
    assert_eq!(config.ssh_port, 22);
    assert_eq!(config.retry_max_retries, 0);
}
