//! Client side of a tool-provider session (spawn, handshake, call, close).

use std::collections::HashMap;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use rmcp::ServiceExt;
use rmcp::model::{CallToolRequestParams, CallToolResult, Tool};
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::TokioChildProcess;
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// How long [`ToolSession::close`] waits for the provider to wind down.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Variables inherited from the parent; everything else must be passed explicitly.
pub const PASSTHROUGH_ENV: &[&str] = &["HOME", "LOGNAME", "PATH", "SHELL", "TERM", "USER"];

/// How to launch a tool provider.
#[derive(Debug, Clone)]
pub struct ProviderCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    /// Per-request deadline. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl ProviderCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            request_timeout: None,
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// The complete environment the child will see.
    pub fn environment(&self) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = PASSTHROUGH_ENV
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
            .collect();
        vars.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env_clear()
            .envs(self.environment())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

/// A live, initialized session with one provider process.
///
/// Dropping the session cancels the client and kills the process;
/// [`ToolSession::close`] lets it exit on its own first.
pub struct ToolSession {
    program: String,
    pid: Option<u32>,
    service: RunningService<RoleClient, ()>,
    tools: Vec<Tool>,
    request_timeout: Option<Duration>,
}

impl ToolSession {
    /// Spawn the provider, run the handshake and fetch its tool list.
    ///
    /// On failure the child is torn down before the error is returned.
    pub async fn open(command: &ProviderCommand) -> Result<Self> {
        let transport =
            TokioChildProcess::new(command.to_command()).map_err(|source| Error::Spawn {
                command: command.program.clone(),
                source,
            })?;
        let pid = transport.id();

        let service = within(command.request_timeout, "initialize", ().serve(transport))
            .await?
            .map_err(|e| Error::Handshake {
                command: command.program.clone(),
                source: Box::new(e),
            })?;

        let listed = within(command.request_timeout, "tools/list", service.list_all_tools())
            .await
            .and_then(|tools| tools.map_err(Error::from));
        let tools = match listed {
            Ok(tools) => tools,
            Err(e) => {
                if let Err(join) = service.cancel().await {
                    warn!(program = %command.program, error = %join, "failed to stop provider");
                }
                return Err(e);
            }
        };

        debug!(
            program = %command.program,
            pid = ?pid,
            tools = tools.len(),
            "tool session ready"
        );
        Ok(Self {
            program: command.program.clone(),
            pid,
            service,
            tools,
            request_timeout: command.request_timeout,
        })
    }

    /// OS process id of the provider, while it is known.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Tools advertised during the handshake.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Call a tool by name.
    ///
    /// A result with `is_error` set is still `Ok`: the tool ran and failed.
    /// Names the provider did not advertise fail without a round trip.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult> {
        if !self.tools.iter().any(|tool| tool.name == name) {
            return Err(Error::ToolNotFound(name.to_string()));
        }

        let params = CallToolRequestParams {
            name: name.to_string().into(),
            arguments,
            meta: None,
            task: None,
        };
        let call = self.service.call_tool(params);
        Ok(within(self.request_timeout, "tools/call", call).await??)
    }

    /// Cancel the client and wait, up to [`SHUTDOWN_GRACE`], for the provider to go.
    ///
    /// A provider still running after the grace period is left to
    /// `kill_on_drop`.
    pub async fn close(self) -> Result<()> {
        let Self {
            program, service, ..
        } = self;

        match tokio::time::timeout(SHUTDOWN_GRACE, service.cancel()).await {
            Ok(reason) => {
                let reason = reason?;
                debug!(%program, ?reason, "tool session closed");
            }
            Err(_) => {
                warn!(%program, "tool provider outlived grace period; left to kill_on_drop");
            }
        }
        Ok(())
    }
}

async fn within<F: Future>(limit: Option<Duration>, what: &str, fut: F) -> Result<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::Timeout(what.to_string())),
        None => Ok(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_env_overrides_passthrough() {
        let command = ProviderCommand::new("car-value")
            .env("PATH", "/opt/tools")
            .env("CAR_VALUE_BASE", "25000");
        let env = command.environment();
        assert_eq!(env.get("PATH").map(String::as_str), Some("/opt/tools"));
        assert_eq!(env.get("CAR_VALUE_BASE").map(String::as_str), Some("25000"));
        assert!(env.keys().all(|k| PASSTHROUGH_ENV.contains(&k.as_str())
            || command.env.contains_key(k)));
    }

    #[test]
    fn builder_collects_args() {
        let command = ProviderCommand::new("python")
            .args(["server.py", "--stdio"])
            .request_timeout(Duration::from_secs(5));
        assert_eq!(command.args, vec!["server.py", "--stdio"]);
        assert_eq!(command.request_timeout, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let command = ProviderCommand::new("/nonexistent/tool-provider");
        let err = ToolSession::open(&command).await.err().unwrap();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn provider_exiting_during_handshake_fails() {
        let command = ProviderCommand::new("sh").args(["-c", "exit 0"]);
        let err = ToolSession::open(&command).await.err().unwrap();
        assert!(matches!(err, Error::Handshake { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_provider_times_out() {
        let command = ProviderCommand::new("sh")
            .args(["-c", "sleep 5"])
            .request_timeout(Duration::from_millis(200));
        let err = ToolSession::open(&command).await.err().unwrap();
        assert!(matches!(err, Error::Timeout(ref what) if what == "initialize"));
    }

    /// Answers `initialize` and `tools/list`, then ignores stdin EOF.
    #[cfg(target_os = "linux")]
    const STUBBORN_PROVIDER: &str = r#"
request_id() { printf '%s' "$1" | sed -n 's/.*"id":\([0-9]*\).*/\1/p'; }
read -r line
printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"stubborn","version":"0"}}}\n' "$(request_id "$line")"
read -r line
read -r line
printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[]}}\n' "$(request_id "$line")"
exec sleep 30
"#;

    #[cfg(target_os = "linux")]
    fn is_running(pid: u32) -> bool {
        // Zombies count as gone: the process has exited.
        std::fs::read_to_string(format!("/proc/{pid}/stat"))
            .ok()
            .and_then(|stat| stat.rsplit_once(") ").map(|(_, rest)| !rest.starts_with('Z')))
            .unwrap_or(false)
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn close_gives_up_on_provider_ignoring_eof() {
        let command = ProviderCommand::new("sh").args(["-c", STUBBORN_PROVIDER]);
        let session = ToolSession::open(&command).await.unwrap();
        assert!(session.tools().is_empty());
        let pid = session.pid().unwrap();
        assert!(is_running(pid));

        let started = std::time::Instant::now();
        session.close().await.unwrap();
        assert!(started.elapsed() < SHUTDOWN_GRACE + Duration::from_secs(2));

        let mut gone = false;
        for _ in 0..100 {
            if !is_running(pid) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(gone, "provider {pid} outlived its session");
    }
}
