use serde::{Deserialize, Serialize};
use url::Url;

/// Hosting provider management API configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ManagementConfig {
    /// Management API base URL.
    /// TOML: `management.api_url`. Default: `https://api.supabase.com/v1/`.
    #[serde(default = "default_api_url")]
    pub api_url: Url,

    /// Pooled endpoint host used when rewriting direct database hosts.
    /// TOML: `management.pooler_host`. Default: `aws-0-us-east-2.pooler.supabase.com`.
    #[serde(default = "default_pooler_host")]
    pub pooler_host: String,

    /// TTL of cached connection strings and project lists, in seconds.
    /// TOML: `management.cache_ttl_secs`. Default: `300`.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Outbound request budget per minute.
    /// TOML: `management.requests_per_minute`. Default: `55`.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Optional upstream HTTP proxy.
    /// TOML: `management.proxy`.
    #[serde(default)]
    pub proxy: Option<Url>,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            pooler_host: default_pooler_host(),
            cache_ttl_secs: default_cache_ttl_secs(),
            requests_per_minute: default_requests_per_minute(),
            proxy: None,
        }
    }
}

fn default_api_url() -> Url {
    Url::parse("https://api.supabase.com/v1/").expect("invalid fixed management URL")
}

fn default_pooler_host() -> String {
    "aws-0-us-east-2.pooler.supabase.com".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_requests_per_minute() -> u32 {
    55
}
