use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// One loyalty tier as written in configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoyaltyTierConfig {
    pub min_delivered_orders: u32,
    /// Discount in percent points, `5` for 5%
    pub percent: Decimal,
}

/// Pricing and lifecycle settings of the order engine
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// VAT as a fraction, `0.20` for 20%
    pub vat_rate: Decimal,
    pub cancellation_grace_minutes: i64,
    pub loyalty_tiers: Vec<LoyaltyTierConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vat_rate: Decimal::new(20, 2),
            cancellation_grace_minutes: 30,
            loyalty_tiers: vec![
                LoyaltyTierConfig {
                    min_delivered_orders: 5,
                    percent: Decimal::new(2, 0),
                },
                LoyaltyTierConfig {
                    min_delivered_orders: 20,
                    percent: Decimal::new(5, 0),
                },
            ],
        }
    }
}

impl EngineConfig {
    /// Check ranges that the type system cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vat_rate < Decimal::ZERO || self.vat_rate >= Decimal::ONE {
            return Err(ConfigError::InvalidValue {
                key: "VAT_RATE",
                value: self.vat_rate.to_string(),
                reason: "must be a fraction in [0, 1)",
            });
        }
        if self.cancellation_grace_minutes < 0 {
            return Err(ConfigError::InvalidValue {
                key: "CANCELLATION_GRACE_MINUTES",
                value: self.cancellation_grace_minutes.to_string(),
                reason: "must not be negative",
            });
        }
        for tier in &self.loyalty_tiers {
            if tier.percent < Decimal::ZERO || tier.percent >= Decimal::ONE_HUNDRED {
                return Err(ConfigError::InvalidValue {
                    key: "LOYALTY_TIERS",
                    value: format!("{}:{}", tier.min_delivered_orders, tier.percent),
                    reason: "percent must be in [0, 100)",
                });
            }
        }
        Ok(())
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read overrides from the environment.
    /// Unset keys keep their defaults; malformed keys are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("VAT_RATE") {
            config.engine.vat_rate = parse("VAT_RATE", &raw)?;
        }
        if let Some(raw) = lookup("CANCELLATION_GRACE_MINUTES") {
            config.engine.cancellation_grace_minutes = parse("CANCELLATION_GRACE_MINUTES", &raw)?;
        }
        if let Some(raw) = lookup("LOYALTY_TIERS") {
            config.engine.loyalty_tiers = parse_tiers(&raw)?;
        }
        if let Some(level) = lookup("RUST_LOG") {
            config.log_level = level;
        }

        config.engine.validate()?;
        Ok(config)
    }
}

fn parse<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: "not a number",
    })
}

/// `"5:2,20:5"` means 2% from 5 delivered orders and 5% from 20.
fn parse_tiers(raw: &str) -> Result<Vec<LoyaltyTierConfig>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| -> Result<LoyaltyTierConfig, ConfigError> {
            let (orders, percent) = part.split_once(':').ok_or(ConfigError::InvalidValue {
                key: "LOYALTY_TIERS",
                value: part.to_string(),
                reason: "expected <orders>:<percent>",
            })?;
            Ok(LoyaltyTierConfig {
                min_delivered_orders: parse("LOYALTY_TIERS", orders)?,
                percent: parse("LOYALTY_TIERS", percent)?,
            })
        })
        .collect()
}
