//! Layered runtime settings: built-in defaults, then an optional TOML file,
//! then `PAPERTRADE__*` environment variables.

use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

pub const ENV_PREFIX: &str = "PAPERTRADE";
pub const DEFAULT_CONFIG_PATH: &str = "config/default";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub user_id: String,
    pub starting_balance: Decimal,
    pub poll_interval_ms: u64,
    pub coingecko_url: String,
    pub alpha_vantage_url: String,
    pub alpha_vantage_key: String,
    #[serde(default)]
    pub database_url: Option<String>,
    pub log_filter: String,
    pub metrics_port: u16,
    pub watchlist_path: String,
}

impl Settings {
    /// Load from `path` (extension optional; a missing file is fine).
    pub fn load(path: Option<&str>) -> Result<Self, SettingsError> {
        let config = Config::builder()
            .set_default("user_id", "123")?
            .set_default("starting_balance", "100000")?
            .set_default("poll_interval_ms", 15_000)?
            .set_default("coingecko_url", "https://api.coingecko.com/api/v3")?
            .set_default("alpha_vantage_url", "https://www.alphavantage.co/query")?
            .set_default("alpha_vantage_key", "demo")?
            .set_default("log_filter", "info,papertrade_rs=debug")?
            .set_default("metrics_port", 9000)?
            .set_default("watchlist_path", "watchlist.json")?
            .add_source(File::with_name(path.unwrap_or(DEFAULT_CONFIG_PATH)).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.starting_balance.is_sign_negative() {
            return Err(SettingsError::Invalid {
                key: "starting_balance",
                reason: format!("must not be negative, got {}", self.starting_balance),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(SettingsError::Invalid {
                key: "poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
