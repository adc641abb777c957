use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub matching: MatchingRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Tunables for pairing and expiry
#[derive(Debug, Deserialize, Clone)]
pub struct MatchingRules {
    /// Largest departure gap in minutes when neither ride is flexible
    #[serde(default = "default_tolerance_minutes")]
    pub time_tolerance_minutes: i64,
    /// Substring that marks an origin as an on-campus pickup point
    #[serde(default = "default_campus_marker")]
    pub campus_marker: String,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_tolerance_minutes() -> i64 {
    30
}

fn default_campus_marker() -> String {
    "campus".to_string()
}

fn default_sweep_interval() -> u64 {
    3600
}

impl Default for MatchingRules {
    fn default() -> Self {
        Self {
            time_tolerance_minutes: default_tolerance_minutes(),
            campus_marker: default_campus_marker(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment and local files are optional overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            // E.g. CAMPOOL_SERVER__PORT=8081 overrides server.port
            .add_source(config::Environment::with_prefix("CAMPOOL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
