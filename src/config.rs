use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::scheduler::SchedulerConfig;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub scheduler: Option<SchedulerSettings>,
    pub wallet: Option<WalletSettings>,
    pub server: Option<ServerSettings>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SchedulerSettings {
    pub poll_interval_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub lookahead_hours: Option<i64>,
    /// The calendar namespace this process transacts for.
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WalletSettings {
    pub master_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServerSettings {
    pub port: Option<u16>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let home = env::var("HOME").unwrap_or_else(|_| ".".into());

        let s = Config::builder()
            // 1. Global config from ~/.tempo/config.{toml,json}
            .add_source(File::with_name(&format!("{}/.tempo/config", home)).required(false))
            // 2. Project config from config/config.{toml,json}
            .add_source(File::with_name("config/config").required(false))
            // 3. Local overrides (not checked in)
            .add_source(File::with_name("config/local").required(false))
            // 4. Environment overrides, e.g. TEMPO_SCHEDULER__MAX_RETRIES
            .add_source(Environment::with_prefix("TEMPO").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        let defaults = SchedulerConfig::default();
        let s = self.scheduler.clone().unwrap_or_default();
        SchedulerConfig {
            poll_interval_secs: s.poll_interval_secs.unwrap_or(defaults.poll_interval_secs),
            max_retries: s.max_retries.unwrap_or(defaults.max_retries),
            lookahead_hours: s.lookahead_hours.unwrap_or(defaults.lookahead_hours),
        }
    }

    pub fn namespace(&self) -> String {
        self.scheduler
            .as_ref()
            .and_then(|s| s.namespace.clone())
            .unwrap_or_else(|| "primary".to_string())
    }

    pub fn master_secret(&self) -> String {
        self.wallet
            .as_ref()
            .and_then(|w| w.master_secret.clone())
            .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
    }

    pub fn port(&self) -> u16 {
        self.server.as_ref().and_then(|s| s.port).unwrap_or(3030)
    }
}
