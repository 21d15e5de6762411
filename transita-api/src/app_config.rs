use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_ttl")]
    pub reservation_ttl_seconds: u64,
    /// Sweep cadence. Kept in seconds so a stale hold never outlives
    /// its TTL by more than a beat.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_payment_base_url")]
    pub payment_base_url: String,
}

fn default_ttl() -> u64 {
    600
}

fn default_sweep_interval() -> u64 {
    5
}

fn default_payment_base_url() -> String {
    "https://pay.transita.dev".to_string()
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            reservation_ttl_seconds: default_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
            payment_base_url: default_payment_base_url(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .set_default("server.port", 8080)?
            .set_default("business_rules.reservation_ttl_seconds", 600)?
            .set_default("business_rules.sweep_interval_seconds", 5)?
            .set_default("business_rules.payment_base_url", default_payment_base_url())?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `TRANSITA__SERVER__PORT=9090` overrides the port.
            .add_source(config::Environment::with_prefix("TRANSITA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
