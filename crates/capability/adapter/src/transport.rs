use async_trait::async_trait;
use domain::DeviceDescriptor;
use std::collections::HashMap;
use std::process::Stdio;

/// 设备传输错误。
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("spawn error: {0}")]
    Spawn(String),
    #[error("command failed: {0}")]
    Command(String),
    #[error("invalid output: {0}")]
    InvalidOutput(String),
    #[error("no scripted response for {0}")]
    Unscripted(String),
}

/// 设备命令执行抽象（SSH、REST 等厂商通道由具体实现承担）。
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    async fn execute(
        &self,
        device: &DeviceDescriptor,
        command: &str,
    ) -> Result<String, TransportError>;
}

/// 通过本机 ssh 子进程执行设备命令的传输实现。
///
/// 设备 params 可覆盖默认连接参数：
/// - `ssh_user`：登录用户
/// - `ssh_port`：端口
#[derive(Debug, Clone)]
pub struct SshProcessTransport {
    user: String,
    port: u16,
    connect_timeout_secs: u64,
}

impl SshProcessTransport {
    pub fn new(user: impl Into<String>, port: u16) -> Self {
        Self {
            user: user.into(),
            port,
            connect_timeout_secs: 10,
        }
    }

    pub fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }
}

#[async_trait]
impl DeviceTransport for SshProcessTransport {
    async fn execute(
        &self,
        device: &DeviceDescriptor,
        command: &str,
    ) -> Result<String, TransportError> {
        let user = device
            .params
            .get("ssh_user")
            .cloned()
            .unwrap_or_else(|| self.user.clone());
        let port = device
            .params
            .get("ssh_port")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(self.port);

        // kill_on_drop：单元超时丢弃 future 时连带回收 ssh 子进程
        let output = tokio::process::Command::new("ssh")
            .arg("-p")
            .arg(port.to_string())
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout_secs))
            .arg(format!("{}@{}", user, device.address))
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| TransportError::Spawn(err.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::Command(format!(
                "ssh exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|err| TransportError::InvalidOutput(err.to_string()))
    }
}

/// 预置应答的传输实现（用于接线与测试）。
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: HashMap<(String, String), String>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为 (设备地址, 命令) 预置一条应答。
    pub fn with_response(
        mut self,
        address: impl Into<String>,
        command: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.responses
            .insert((address.into(), command.into()), output.into());
        self
    }
}

#[async_trait]
impl DeviceTransport for ScriptedTransport {
    async fn execute(
        &self,
        device: &DeviceDescriptor,
        command: &str,
    ) -> Result<String, TransportError> {
        self.responses
            .get(&(device.address.clone(), command.to_string()))
            .cloned()
            .ok_or_else(|| {
                TransportError::Unscripted(format!("{} `{}`", device.address, command))
            })
    }
}
