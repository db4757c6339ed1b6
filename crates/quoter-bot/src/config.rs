//! Application configuration.

use std::time::Duration;

use quoter_executor::ExecutorConfig;
use quoter_mm::MakerConfig;
use quoter_registry::DEFAULT_METADATA_TTL;
use quoter_scheduler::SchedulerConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    /// Live market data, simulated orders.
    #[default]
    Paper,
    /// Real orders. Needs an external signer.
    Live,
}

/// Info endpoint and metadata cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_info_url")]
    pub info_url: String,
    #[serde(default = "default_metadata_ttl_secs")]
    pub metadata_ttl_secs: u64,
}

impl RegistryConfig {
    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_ttl_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            info_url: default_info_url(),
            metadata_ttl_secs: default_metadata_ttl_secs(),
        }
    }
}

fn default_info_url() -> String {
    "https://api.hyperliquid.xyz/info".to_string()
}

fn default_metadata_ttl_secs() -> u64 {
    DEFAULT_METADATA_TTL.as_secs()
}

/// Paper exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Account value reported by the paper exchange (USD).
    #[serde(default = "default_starting_balance")]
    pub starting_balance: Decimal,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
        }
    }
}

fn default_starting_balance() -> Decimal {
    Decimal::new(10_000, 0)
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub mode: OperatingMode,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub maker: MakerConfig,
    #[serde(default)]
    pub paper: PaperConfig,
    /// Engine status log interval in seconds (0 disables).
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
}

fn default_status_interval_secs() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::default(),
            registry: RegistryConfig::default(),
            scheduler: SchedulerConfig::default(),
            executor: ExecutorConfig::default(),
            maker: MakerConfig::default(),
            paper: PaperConfig::default(),
            status_interval_secs: default_status_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.maker.symbols.is_empty() {
            return Err(AppError::Config("maker.symbols is empty".to_string()));
        }
        self.maker.validate().map_err(AppError::Config)?;
        if self.paper.starting_balance < Decimal::ZERO {
            return Err(AppError::Config(
                "paper.starting_balance must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_paper(&self) -> bool {
        self.mode == OperatingMode::Paper
    }
}
