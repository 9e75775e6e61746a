use rsvp_core::ReservationModel;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub event: EventConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Upper bound for any single store call, pool acquisition included.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_max_connections() -> u32 { 5 }
fn default_request_timeout_ms() -> u64 { 3000 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
}

// Browser storage outlives the session in practice; 30 days
fn default_cache_ttl() -> u64 { 30 * 24 * 3600 }

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    /// Empty disables invitation delivery.
    #[serde(default)]
    pub brokers: String,
    #[serde(default = "default_invitation_topic")]
    pub invitation_topic: String,
}

fn default_invitation_topic() -> String { "notifications.invitation".to_string() }

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: String::new(),
            invitation_topic: default_invitation_topic(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventConfig {
    pub date: String,
    pub time: String,
    pub location: String,
    pub rsvp_base_url: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RegistryConfig {
    #[serde(default)]
    pub reservation_model: ReservationModel,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `RSVP_SERVER__PORT=9000`
            .add_source(config::Environment::with_prefix("RSVP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
