mod basic;
mod sections;

pub use basic::BasicConfig;
pub use sections::{GatewayConfig, LlmConfig, ManagementConfig, SecurityConfig, StreamFormat};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::LazyLock};

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core server configuration (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Language model provider settings (see `llm` table in config.toml).
    #[serde(default)]
    pub llm: LlmConfig,

    /// Tool server launcher settings (see `gateway` table in config.toml).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Hosting provider management API (see `management` table in config.toml).
    #[serde(default)]
    pub management: ManagementConfig,

    /// Credential cipher settings (see `security` table in config.toml).
    #[serde(default)]
    pub security: SecurityConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "SQLITO_";

impl Config {
    /// Builds a Figment that merges defaults, a config TOML file and `SQLITO_` env overrides.
    ///
    /// Env keys use `__` as the table separator, e.g. `SQLITO_LLM__MAX_STEPS=3`.
    pub fn figment() -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let figment = if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment.merge(Toml::file(DEFAULT_CONFIG_FILE))
        } else {
            figment
        };
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads configuration by merging defaults and `config.toml` if present.
    ///
    /// Note: this does **not** validate required fields like `basic.sqlito_key`. Binaries should
    /// call `Config::from_toml()` instead (or validate explicitly) to avoid running with insecure
    /// defaults.
    pub fn from_optional_toml() -> Self {
        Self::figment().extract().unwrap_or_else(|err| {
            panic!("failed to extract configuration (defaults + optional config.toml): {err}")
        })
    }

    /// Loads configuration from the TOML file (with defaults) and validates required fields.
    pub fn from_toml() -> Self {
        if !PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            panic!("config file not found: {}", DEFAULT_CONFIG_FILE);
        }
        let cfg: Self = Self::figment().extract().unwrap_or_else(|err| {
            panic!(
                "failed to extract configuration from {}: {err}",
                DEFAULT_CONFIG_FILE
            )
        });
        if cfg.basic.sqlito_key.trim().is_empty() {
            panic!("basic.sqlito_key must be set and non-empty");
        }
        if cfg.llm.max_steps == 0 {
            panic!("llm.max_steps must be at least 1");
        }
        cfg
    }
}

/// Global, lazily-initialized configuration instance.
pub static CONFIG: LazyLock<Config> = LazyLock::new(Config::from_optional_toml);
