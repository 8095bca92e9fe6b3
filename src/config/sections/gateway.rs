use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tool server launcher configuration managed by Figment.
///
/// `args` and `env` values may contain the placeholders `{connection_string}`,
/// `{access_token}` and `{project_ref}`, substituted per chat request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Launcher executable, looked up on `PATH`.
    /// TOML: `gateway.command`. Default: `npx`.
    #[serde(default = "default_command")]
    pub command: String,

    /// Launcher arguments.
    /// TOML: `gateway.args`.
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Extra environment for the tool server.
    /// TOML: `gateway.env`.
    #[serde(default = "default_env")]
    pub env: BTreeMap<String, String>,

    /// Time allowed for spawn + `initialize` + `tools/list`, in seconds.
    /// TOML: `gateway.handshake_timeout_secs`. Default: `90` (first `npx` run downloads the package).
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,

    /// Per `tools/call` timeout, in seconds.
    /// TOML: `gateway.call_timeout_secs`. Default: `60`.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Reject non-read statements in `execute_sql` before they reach the tool server.
    /// TOML: `gateway.read_only_guard`. Default: `false`.
    #[serde(default)]
    pub read_only_guard: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
            env: default_env(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            read_only_guard: false,
        }
    }
}

fn default_command() -> String {
    "npx".to_string()
}

fn default_args() -> Vec<String> {
    [
        "-y",
        "@supabase/mcp-server-supabase@latest",
        "--access-token",
        "{access_token}",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_env() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "DATABASE_URL".to_string(),
        "{connection_string}".to_string(),
    )])
}

fn default_handshake_timeout_secs() -> u64 {
    90
}

fn default_call_timeout_secs() -> u64 {
    60
}
