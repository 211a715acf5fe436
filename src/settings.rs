use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GatewaySettings {
    pub base_url: String,
    #[serde(default)]
    pub client_id: String,
    pub api_key: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_gateway_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            client_id: String::new(),
            api_key: String::new(),
            currency: default_currency(),
            timeout_ms: default_gateway_timeout_ms(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FlowSettings {
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_max_wait", with = "humantime_serde")]
    pub max_wait: Duration,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_wait: default_max_wait(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub flow: FlowSettings,
}

impl Config {
    /// Load from config.toml (if present) and environment variables.
    /// Environment variables override file values.
    /// Supported env keys: PAYLINK_BASE_URL, PAYLINK_CLIENT_ID, PAYLINK_API_KEY,
    /// PAYLINK_CURRENCY, PAYLINK_TIMEOUT_MS, PAYLINK_POLL_INTERVAL, PAYLINK_MAX_WAIT
    pub fn load() -> Self {
        // 1) Start with defaults + config.toml only if it exists
        let base: Config = Default::default();
        let mut fig = Figment::from(Serialized::defaults(base));
        if std::path::Path::new("config.toml").exists() {
            fig = fig.merge(Toml::file("config.toml"));
        }
        let mut cfg: Config = fig.extract().unwrap_or_default();

        // 2) Overlay environment variables explicitly
        if let Ok(v) = std::env::var("PAYLINK_BASE_URL") {
            cfg.gateway.base_url = v;
        }
        if let Ok(v) = std::env::var("PAYLINK_CLIENT_ID") {
            cfg.gateway.client_id = v;
        }
        if let Ok(v) = std::env::var("PAYLINK_API_KEY") {
            cfg.gateway.api_key = v;
        }
        if let Ok(v) = std::env::var("PAYLINK_CURRENCY") {
            cfg.gateway.currency = v;
        }
        if let Ok(v) = std::env::var("PAYLINK_TIMEOUT_MS") {
            cfg.gateway.timeout_ms = v.parse().unwrap_or(cfg.gateway.timeout_ms);
        }
        if let Ok(v) = std::env::var("PAYLINK_POLL_INTERVAL") {
            cfg.flow.poll_interval = parse_duration_env(&v, cfg.flow.poll_interval);
        }
        if let Ok(v) = std::env::var("PAYLINK_MAX_WAIT") {
            cfg.flow.max_wait = parse_duration_env(&v, cfg.flow.max_wait);
        }

        cfg
    }

    pub fn from_env() -> Self {
        Self::load()
    }
}

fn parse_duration_env(value: &str, current: Duration) -> Duration {
    humantime::parse_duration(value).unwrap_or(current)
}

fn default_currency() -> String {
    "VND".to_string()
}

fn default_gateway_timeout_ms() -> u64 {
    15_000
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_max_wait() -> Duration {
    Duration::from_secs(300) // 5 minutes
}
