//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.relay/config.json`) and environment.
//! Every collaborator endpoint and per-call timeout is configurable; the bot's user id
//! must be set before the gateway will start.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Bot account the relay answers for.
    #[serde(default)]
    pub bot: BotConfig,

    /// Base URLs of the collaborating services.
    #[serde(default)]
    pub services: ServicesConfig,

    /// Per-call timeouts in seconds.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the webhook listener (default 8080).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; the messaging platform calls in from another host).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Bot identity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    /// User id of the bot account. Overridden by RELAY_BOT_USER_ID env.
    pub user_id: Option<String>,

    /// Administrative account used to log in on every invocation. Overridden by RELAY_ADMIN_ACCOUNT env.
    #[serde(default = "default_admin_account")]
    pub admin_account: String,
}

fn default_admin_account() -> String {
    "admin1".to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            admin_account: default_admin_account(),
        }
    }
}

/// Collaborator base URLs (scheme + host + port, no trailing slash needed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesConfig {
    /// Admin API serving `/account/login`.
    #[serde(default = "default_admin_api")]
    pub admin_api: String,
    /// Chat API serving `/user/find/public`.
    #[serde(default = "default_chat_api")]
    pub chat_api: String,
    /// IM API serving `/msg/send_msg`.
    #[serde(default = "default_im_api")]
    pub im_api: String,
    /// Question-answering backend serving `/generate_QA_chain`.
    #[serde(default = "default_qa_api")]
    pub qa_api: String,
}

fn default_admin_api() -> String {
    "http://127.0.0.1:10009".to_string()
}

fn default_chat_api() -> String {
    "http://127.0.0.1:10008".to_string()
}

fn default_im_api() -> String {
    "http://127.0.0.1:10002".to_string()
}

fn default_qa_api() -> String {
    "http://127.0.0.1:5000".to_string()
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            admin_api: default_admin_api(),
            chat_api: default_chat_api(),
            im_api: default_im_api(),
            qa_api: default_qa_api(),
        }
    }
}

/// Timeouts in seconds for each outbound call. 0 disables the bound for that call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutsConfig {
    #[serde(default = "default_short_timeout")]
    pub login_secs: u64,
    #[serde(default = "default_short_timeout")]
    pub lookup_secs: u64,
    /// Answer generation is slow; the default allowance is much larger than the others.
    #[serde(default = "default_qa_timeout")]
    pub qa_secs: u64,
    #[serde(default = "default_short_timeout")]
    pub send_secs: u64,
}

fn default_short_timeout() -> u64 {
    10
}

fn default_qa_timeout() -> u64 {
    1000
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            login_secs: default_short_timeout(),
            lookup_secs: default_short_timeout(),
            qa_secs: default_qa_timeout(),
            send_secs: default_short_timeout(),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Resolve the bot user id: env RELAY_BOT_USER_ID overrides config.
pub fn resolve_bot_user_id(config: &Config) -> Option<String> {
    non_empty_env("RELAY_BOT_USER_ID").or_else(|| {
        config
            .bot
            .user_id
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve the admin account: env RELAY_ADMIN_ACCOUNT overrides config.
pub fn resolve_admin_account(config: &Config) -> String {
    non_empty_env("RELAY_ADMIN_ACCOUNT").unwrap_or_else(|| config.bot.admin_account.trim().to_string())
}

/// Strip trailing slashes so paths can be appended with `format!("{}/path", base)`.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".relay").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path (or RELAY_CONFIG_PATH / default). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
