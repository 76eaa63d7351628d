//! Gateway configuration.
//!
//! Precedence (later wins): built-in defaults, the TOML file named by
//! `MINDSTATE_CONFIG` (default `config/gateway`, skipped when missing), then
//! `MINDSTATE__*` environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `MINDSTATE__APP_NAME` | `Mindstate Cognitive API` |
//! | `MINDSTATE__HOST` | `127.0.0.1` |
//! | `MINDSTATE__PORT` | `8080` |
//! | `MINDSTATE__DATABASE_PATH` | `./data/mindstate.sqlite` |
//! | `MINDSTATE__ENV` | `development` |
//! | `MINDSTATE__LOG_LEVEL` | `info` |
//! | `MINDSTATE__REQUEST_TIMEOUT_SECS` | `15` (must be at least 1) |

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub app_name: String,
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub env: String,
    pub log_level: String,
    pub request_timeout_secs: u64,
}

impl GatewayConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("MINDSTATE_CONFIG").unwrap_or_else(|_| "config/gateway".to_string());
        Self::load_from(&config_path)
    }

    /// Same as [`Self::load`] with an explicit file stem or path.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("app_name", "Mindstate Cognitive API")?
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080_i64)?
            .set_default("database_path", "./data/mindstate.sqlite")?
            .set_default("env", "development")?
            .set_default("log_level", "info")?
            .set_default("request_timeout_secs", 15_i64)?;

        let path = Path::new(config_path);
        let with_ext = path.with_extension("toml");
        let builder = if path.is_file() {
            builder.add_source(config::File::from(path))
        } else if with_ext.is_file() {
            builder.add_source(config::File::from(with_ext.as_path()))
        } else {
            builder
        };

        let cfg: Self = builder
            .add_source(config::Environment::with_prefix("MINDSTATE").separator("__"))
            .build()?
            .try_deserialize()?;
        if cfg.request_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(cfg)
    }

    pub fn is_development(&self) -> bool {
        self.env.eq_ignore_ascii_case("development")
    }

    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            app_name: "Mindstate Cognitive API".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_path: "./data/mindstate.sqlite".to_string(),
            env: "development".to_string(),
            log_level: "info".to_string(),
            request_timeout_secs: 15,
        }
    }
}
