use serde::Deserialize;
use std::env;

use festbook_engine::EngineRules;

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
    pub hold_ttl_seconds: u64,
    pub tax_rate: f64,
    pub service_fee: f64,
    #[serde(default = "default_tolerance")]
    pub amount_tolerance: f64,
    #[serde(default = "default_max_tickets")]
    pub max_tickets_per_session: u32,
    #[serde(default = "default_retention")]
    pub retention_seconds: u64,
}

fn default_tolerance() -> f64 {
    0.01
}

fn default_max_tickets() -> u32 {
    10
}

fn default_retention() -> u64 {
    3600
}

impl BusinessRules {
    pub fn to_engine_rules(&self) -> EngineRules {
        EngineRules {
            hold_ttl_seconds: self.hold_ttl_seconds,
            tax_rate: self.tax_rate,
            service_fee: self.service_fee,
            amount_tolerance: self.amount_tolerance,
            max_tickets_per_session: self.max_tickets_per_session,
            retention_seconds: self.retention_seconds,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Environment-specific file, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // E.g. FESTBOOK__SERVER__PORT=9090
            .add_source(config::Environment::with_prefix("FESTBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
