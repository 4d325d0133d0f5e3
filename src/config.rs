use crate::domain::Decimal;
use crate::lifecycle::SimParams;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Snapshot database; `None` runs in memory only.
    pub database_path: Option<String>,
    pub oracle_tick_ms: i64,
    pub oracle_volatility: Decimal,
    pub swap_fee_rate: Decimal,
    pub confirm_delay_min_ms: i64,
    pub confirm_delay_max_ms: i64,
    /// Fixed seed for reproducible sessions; entropy when absent.
    pub rng_seed: Option<u64>,
    pub log_retention: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16, "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let oracle_tick_ms = parse_or(&env_map, "ORACLE_TICK_MS", 2500i64, "must be a valid i64")?;
        if oracle_tick_ms <= 0 {
            return Err(invalid("ORACLE_TICK_MS", "must be positive"));
        }

        let oracle_volatility = parse_decimal_or(&env_map, "ORACLE_VOLATILITY", "0.35")?;
        if !oracle_volatility.is_positive() || oracle_volatility > Decimal::one() {
            return Err(invalid("ORACLE_VOLATILITY", "must be in (0, 1]"));
        }

        let swap_fee_rate = parse_decimal_or(&env_map, "SWAP_FEE_RATE", "0.003")?;
        if swap_fee_rate.is_negative() || swap_fee_rate >= Decimal::one() {
            return Err(invalid("SWAP_FEE_RATE", "must be in [0, 1)"));
        }

        let confirm_delay_min_ms =
            parse_or(&env_map, "CONFIRM_DELAY_MIN_MS", 900i64, "must be a valid i64")?;
        let confirm_delay_max_ms =
            parse_or(&env_map, "CONFIRM_DELAY_MAX_MS", 2300i64, "must be a valid i64")?;
        if confirm_delay_min_ms < 0 {
            return Err(invalid("CONFIRM_DELAY_MIN_MS", "must not be negative"));
        }
        if confirm_delay_max_ms < confirm_delay_min_ms {
            return Err(invalid(
                "CONFIRM_DELAY_MAX_MS",
                "must be >= CONFIRM_DELAY_MIN_MS",
            ));
        }

        let rng_seed = match env_map.get("RNG_SEED") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| invalid("RNG_SEED", "must be a valid u64"))?,
            ),
            None => None,
        };

        let log_retention = parse_or(&env_map, "LOG_RETENTION", 200usize, "must be a valid usize")?;
        if log_retention == 0 {
            return Err(invalid("LOG_RETENTION", "must be at least 1"));
        }

        Ok(Config {
            port,
            database_path,
            oracle_tick_ms,
            oracle_volatility,
            swap_fee_rate,
            confirm_delay_min_ms,
            confirm_delay_max_ms,
            rng_seed,
            log_retention,
        })
    }

    /// Core simulation parameters derived from this configuration.
    pub fn sim_params(&self) -> SimParams {
        let mut params = SimParams::default();
        params.amm.fee_rate = self.swap_fee_rate;
        params.oracle.default_volatility = self.oracle_volatility;
        params.oracle_tick_ms = self.oracle_tick_ms;
        params.confirm_delay_min_ms = self.confirm_delay_min_ms;
        params.confirm_delay_max_ms = self.confirm_delay_max_ms;
        params.log_retention = self.log_retention;
        params
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_path: None,
            oracle_tick_ms: 2500,
            oracle_volatility: Decimal::from_parts(35, 2),
            swap_fee_rate: Decimal::from_parts(3, 3),
            confirm_delay_min_ms: 900,
            confirm_delay_max_ms: 2300,
            rng_seed: None,
            log_retention: 200,
        }
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue(key.to_string(), reason.to_string())
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    reason: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| invalid(key, reason)),
        None => Ok(default),
    }
}

fn parse_decimal_or(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Decimal, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    Decimal::from_str(raw.trim()).map_err(|_| invalid(key, "must be a decimal number"))
}
