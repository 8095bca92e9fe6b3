use super::{
    EXECUTE_SQL, GatewayBinding, GatewayLauncher, LIST_TABLES, ToolGateway, ToolOutcome,
    ToolResultPayload, check_read_only, fixed_tools,
};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use async_trait::async_trait;
use serde_json::{Value, json};
use sqlito_schema::mcp::{ListToolsResult, initialize_params};
use sqlito_schema::{CallToolResult, JsonRpcRequest, JsonRpcResponse, ToolSpec};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

const CLIENT_NAME: &str = "sqlito";
const CLOSE_GRACE: Duration = Duration::from_secs(3);
const STDERR_PREVIEW_CHARS: usize = 400;

/// Opens stdio tool servers from the `gateway` config table.
#[derive(Debug, Clone)]
pub struct StdioLauncher {
    cfg: GatewayConfig,
}

impl StdioLauncher {
    pub fn new(cfg: GatewayConfig) -> Self {
        Self { cfg }
    }

    /// Resolve the launcher on `PATH`.
    pub fn probe(&self) -> Result<PathBuf, GatewayError> {
        which::which(&self.cfg.command).map_err(|_| GatewayError::LauncherMissing {
            command: self.cfg.command.clone(),
        })
    }
}

fn render(template: &str, binding: &GatewayBinding) -> String {
    template
        .replace("{connection_string}", &binding.connection_string)
        .replace("{access_token}", &binding.access_token)
        .replace("{project_ref}", &binding.instance_ref)
}

#[async_trait]
impl GatewayLauncher for StdioLauncher {
    async fn open(&self, binding: &GatewayBinding) -> Result<Box<dyn ToolGateway>, GatewayError> {
        let program = self.probe()?;
        let args: Vec<String> = self.cfg.args.iter().map(|a| render(a, binding)).collect();

        let mut child = Command::new(&program)
            .args(&args)
            .envs(self.cfg.env.iter().map(|(k, v)| (k, render(v, binding))))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        info!(
            command = %program.display(),
            instance_ref = %binding.instance_ref,
            pid = ?child.id(),
            "Tool server spawned"
        );

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GatewayError::Handshake("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GatewayError::Handshake("child stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            let instance_ref = binding.instance_ref.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(
                        instance_ref = %instance_ref,
                        "[tool-server] {:.len$}",
                        line,
                        len = STDERR_PREVIEW_CHARS
                    );
                }
            });
        }

        let mut gateway = StdioGateway {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
            call_timeout: Duration::from_secs(self.cfg.call_timeout_secs.max(1)),
            read_only_guard: self.cfg.read_only_guard,
            closed: false,
        };

        let handshake_secs = self.cfg.handshake_timeout_secs.max(1);
        let handshake = tokio::time::timeout(
            Duration::from_secs(handshake_secs),
            gateway.handshake(),
        )
        .await;

        match handshake {
            Ok(Ok(())) => Ok(Box::new(gateway)),
            Ok(Err(e)) => {
                gateway.close().await;
                Err(match e {
                    GatewayError::Io(_) | GatewayError::Timeout { .. } => e,
                    other => GatewayError::Handshake(other.to_string()),
                })
            }
            Err(_) => {
                gateway.close().await;
                Err(GatewayError::Timeout {
                    method: "initialize".to_string(),
                    secs: handshake_secs,
                })
            }
        }
    }
}

/// One running tool server child speaking newline-delimited JSON-RPC.
pub struct StdioGateway {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    call_timeout: Duration,
    read_only_guard: bool,
    closed: bool,
}

impl StdioGateway {
    async fn handshake(&mut self) -> Result<(), GatewayError> {
        let init = self
            .request(
                "initialize",
                initialize_params(CLIENT_NAME, env!("CARGO_PKG_VERSION")),
            )
            .await?;
        debug!(
            server = %init.get("serverInfo").cloned().unwrap_or(serde_json::Value::Null),
            protocol = %init.get("protocolVersion").cloned().unwrap_or(serde_json::Value::Null),
            "Tool server initialized"
        );
        self.notify("notifications/initialized").await?;

        let listed: ListToolsResult =
            serde_json::from_value(self.request("tools/list", json!({})).await?)
                .map_err(|e| GatewayError::Protocol(format!("tools/list: {e}")))?;
        for wanted in [LIST_TABLES, EXECUTE_SQL] {
            if !listed.tools.iter().any(|t| t.name == wanted) {
                warn!(tool = wanted, "Tool server does not advertise a required tool");
            }
        }
        Ok(())
    }

    async fn write_line(&mut self, msg: &JsonRpcRequest) -> Result<(), GatewayError> {
        let stdin = self.stdin.as_mut().ok_or(GatewayError::Closed)?;
        let mut line = serde_json::to_vec(msg)
            .map_err(|e| GatewayError::Protocol(format!("encode request: {e}")))?;
        line.push(b'\n');
        stdin.write_all(&line).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn notify(&mut self, method: &str) -> Result<(), GatewayError> {
        self.write_line(&JsonRpcRequest::notification(method)).await
    }

    /// Send one request and read stdout until the response with the same id arrives.
    ///
    /// Lines that are not JSON-RPC responses (server logs, notifications, stale replies after a
    /// timeout) are skipped.
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, GatewayError> {
        self.next_id += 1;
        let id = self.next_id;
        self.write_line(&JsonRpcRequest::call(id, method, params))
            .await?;

        loop {
            let Some(line) = self.stdout.next_line().await? else {
                return Err(GatewayError::Closed);
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let resp: JsonRpcResponse = match serde_json::from_str(line) {
                Ok(resp) => resp,
                Err(_) => {
                    debug!("[tool-server] non-JSON stdout line: {:.200}", line);
                    continue;
                }
            };
            if resp.id_u64() != Some(id) {
                continue;
            }
            if let Some(err) = resp.error {
                return Err(GatewayError::Rpc(err));
            }
            return Ok(resp.result.unwrap_or(Value::Null));
        }
    }
}

/// Accept the `schema` argument advertised to the model and forward it as the server's `schemas`.
fn adapt_args(name: &str, args: &Value) -> Value {
    let mut args = args.clone();
    if name == LIST_TABLES
        && let Some(obj) = args.as_object_mut()
        && !obj.contains_key("schemas")
    {
        let schema = obj
            .remove("schema")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "public".to_string());
        obj.insert("schemas".to_string(), json!([schema]));
    }
    args
}

#[async_trait]
impl ToolGateway for StdioGateway {
    fn list_tools(&self) -> Vec<ToolSpec> {
        fixed_tools()
    }

    async fn invoke(&mut self, name: &str, args: &Value) -> ToolOutcome {
        if self.closed {
            return ToolOutcome::error("tool server is closed");
        }
        if self.read_only_guard && name == EXECUTE_SQL {
            let query = args.get("query").and_then(Value::as_str).unwrap_or_default();
            if let Err(reason) = check_read_only(query) {
                warn!(tool = name, reason = %reason, "Query rejected by read-only guard");
                return ToolOutcome::error(json!({ "error": reason }).to_string());
            }
        }

        let params = json!({ "name": name, "arguments": adapt_args(name, args) });
        let secs = self.call_timeout.as_secs();
        let res = match tokio::time::timeout(self.call_timeout, self.request("tools/call", params))
            .await
        {
            Ok(res) => res,
            Err(_) => Err(GatewayError::Timeout {
                method: format!("tools/call {name}"),
                secs,
            }),
        };

        match res {
            Ok(value) => match serde_json::from_value::<CallToolResult>(value.clone()) {
                Ok(result) => {
                    let (payload, flagged) = ToolResultPayload::from_call_result(result);
                    payload.resolve(flagged)
                }
                Err(_) => ToolResultPayload::from_value(value).resolve(false),
            },
            Err(e) => {
                warn!(tool = name, error = %e, "Tool call failed");
                ToolOutcome::error(json!({ "error": e.to_string() }).to_string())
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // EOF on stdin asks the server to exit.
        drop(self.stdin.take());

        match tokio::time::timeout(CLOSE_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "Tool server exited"),
            Ok(Err(e)) => warn!(error = %e, "Waiting for tool server failed"),
            Err(_) => {
                if let Err(e) = self.child.kill().await {
                    warn!(error = %e, "Killing tool server failed");
                } else {
                    debug!("Tool server killed after grace period");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding() -> GatewayBinding {
        GatewayBinding {
            instance_ref: "abc".to_string(),
            connection_string: "postgresql://u:p@h/db".to_string(),
            access_token: "tok".to_string(),
        }
    }

    #[test]
    fn templates_are_rendered() {
        assert_eq!(
            render("--access-token={access_token} {project_ref}", &binding()),
            "--access-token=tok abc"
        );
        assert_eq!(
            render("{connection_string}", &binding()),
            "postgresql://u:p@h/db"
        );
    }

    #[test]
    fn list_tables_schema_is_forwarded_as_schemas() {
        let args = adapt_args(LIST_TABLES, &json!({"project_id": "abc", "schema": "sales"}));
        assert_eq!(args, json!({"project_id": "abc", "schemas": ["sales"]}));

        let args = adapt_args(LIST_TABLES, &json!({"project_id": "abc"}));
        assert_eq!(args["schemas"], json!(["public"]));

        let args = adapt_args(EXECUTE_SQL, &json!({"project_id": "abc", "query": "select 1"}));
        assert_eq!(args, json!({"project_id": "abc", "query": "select 1"}));
    }

    #[tokio::test]
    async fn missing_launcher_is_reported_distinctly() {
        let launcher = StdioLauncher::new(GatewayConfig {
            command: "sqlito-definitely-not-installed".to_string(),
            ..GatewayConfig::default()
        });
        let err = launcher.open(&binding()).await.err().expect("must fail");
        assert!(matches!(err, GatewayError::LauncherMissing { .. }), "{err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn speaks_json_rpc_over_stdio() {
        // A shell script standing in for an MCP server: answers ids 1 (initialize),
        // 2 (tools/list) and 3 (tools/call) in order.
        let script = r#"
read -r _init
printf '%s\n' 'server log line'
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{}}}'
read -r _notif
read -r _list
printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"list_tables","inputSchema":{}},{"name":"execute_sql","inputSchema":{}}]}}'
read -r _call
printf '%s\n' '{"jsonrpc":"2.0","method":"notifications/message","params":{}}'
printf '%s\n' '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"[{\"n\":1}]"}]}}'
read -r _eof
"#;
        let launcher = StdioLauncher::new(GatewayConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            env: Default::default(),
            handshake_timeout_secs: 5,
            call_timeout_secs: 5,
            read_only_guard: true,
        });

        let mut gw = launcher.open(&binding()).await.expect("open");
        assert_eq!(gw.list_tools().len(), 2);

        let rejected = gw
            .invoke(EXECUTE_SQL, &json!({"project_id": "abc", "query": "DROP TABLE x"}))
            .await;
        assert!(rejected.is_error);

        let ok = gw
            .invoke(EXECUTE_SQL, &json!({"project_id": "abc", "query": "SELECT 1 AS n"}))
            .await;
        assert_eq!(
            ok,
            ToolOutcome {
                text: "[{\"n\":1}]".to_string(),
                is_error: false
            }
        );

        gw.close().await;
        gw.close().await;
        let after = gw.invoke(LIST_TABLES, &json!({"project_id": "abc"})).await;
        assert!(after.is_error);
    }
}
