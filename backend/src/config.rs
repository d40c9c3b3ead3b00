//! Configuration management for the Farm Management Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with FMS_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Generative-language API configuration
    pub gemini: GeminiConfig,

    /// Advisor behaviour
    pub advisor: AdvisorConfig,

    /// Real-time event feed
    pub events: EventsConfig,

    /// Upload limits
    pub uploads: UploadsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens and hashing refresh tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    /// API key sent as `x-goog-api-key`
    pub api_key: String,

    /// Model name, e.g. gemini-1.5-flash
    pub model: String,

    /// API base URL up to and including the version segment
    pub base_url: String,

    /// Client timeout for a single generate call
    pub timeout_secs: u64,

    /// Sampling temperature
    pub temperature: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdvisorConfig {
    /// Default number of forecast days
    pub forecast_days: u32,

    /// Upper bound on returned crop recommendations
    pub max_crop_recommendations: usize,

    /// Previous chat turns sent with each message
    pub chat_history_limit: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    /// Broadcast channel capacity per server
    pub channel_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadsConfig {
    /// Largest accepted farm map image
    pub max_map_image_bytes: usize,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("FMS_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("gemini.model", "gemini-1.5-flash")?
            .set_default(
                "gemini.base_url",
                "https://generativelanguage.googleapis.com/v1beta",
            )?
            .set_default("gemini.timeout_secs", 30)?
            .set_default("gemini.temperature", 0.4)?
            .set_default("advisor.forecast_days", 7)?
            .set_default("advisor.max_crop_recommendations", 8)?
            .set_default("advisor.chat_history_limit", 20)?
            .set_default("events.channel_capacity", 256)?
            .set_default("uploads.max_map_image_bytes", 5 * 1024 * 1024)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (FMS_ prefix)
            .add_source(
                Environment::with_prefix("FMS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}
