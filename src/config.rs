//! Environment-driven configuration (C3): `Config::from_env` with
//! fail-fast secret validation at startup.

use std::fmt;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::secrets::redact;

/// All timing/limit constants named in spec.md §6.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub api_secret: String,
    pub bind_addr: String,

    pub tick_interval_ms: u64,
    pub ticks_per_trading_day: u64,
    pub ticks_after_hours: u64,
    pub market_open_tick: u64,
    pub market_close_tick: u64,

    pub max_order_quantity: i64,
    pub min_order_quantity: i64,
    pub min_price: rust_decimal::Decimal,
    pub max_price: rust_decimal::Decimal,
    pub max_leverage: u32,
    pub default_margin_requirement: rust_decimal::Decimal,

    pub tick_event_retention: u64,
    pub webhook_concurrency: usize,
    pub regime_window_ticks: u64,

    pub starting_cash: rust_decimal::Decimal,
}

/// Hand-written so `jwt_secret`/`api_secret` never appear in cleartext if
/// `Config` is ever logged or debug-printed as a whole.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url)
            .field("jwt_secret", &redact(&self.jwt_secret))
            .field("api_secret", &redact(&self.api_secret))
            .field("bind_addr", &self.bind_addr)
            .field("tick_interval_ms", &self.tick_interval_ms)
            .field("ticks_per_trading_day", &self.ticks_per_trading_day)
            .field("ticks_after_hours", &self.ticks_after_hours)
            .field("market_open_tick", &self.market_open_tick)
            .field("market_close_tick", &self.market_close_tick)
            .field("max_order_quantity", &self.max_order_quantity)
            .field("min_order_quantity", &self.min_order_quantity)
            .field("min_price", &self.min_price)
            .field("max_price", &self.max_price)
            .field("max_leverage", &self.max_leverage)
            .field("default_margin_requirement", &self.default_margin_requirement)
            .field("tick_event_retention", &self.tick_event_retention)
            .field("webhook_concurrency", &self.webhook_concurrency)
            .field("regime_window_ticks", &self.regime_window_ticks)
            .field("starting_cash", &self.starting_cash)
            .finish()
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "./wallstreetsim.db".to_string());
        let jwt_secret = require_secret("JWT_SECRET")?;
        let api_secret = require_secret("API_SECRET")?;
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        Ok(Self {
            database_url,
            jwt_secret,
            api_secret,
            bind_addr,

            tick_interval_ms: env_or("TICK_INTERVAL_MS", 1_000),
            ticks_per_trading_day: env_or("TICKS_PER_TRADING_DAY", 390),
            ticks_after_hours: env_or("TICKS_AFTER_HOURS", 60),
            market_open_tick: env_or("MARKET_OPEN_TICK", 0),
            market_close_tick: env_or("MARKET_CLOSE_TICK", 390),

            max_order_quantity: env_or("MAX_ORDER_QUANTITY", 1_000_000),
            min_order_quantity: env_or("MIN_ORDER_QUANTITY", 1),
            min_price: env_or("MIN_PRICE", "0.01".to_string()).parse().unwrap_or(rust_decimal::Decimal::new(1, 2)),
            max_price: env_or("MAX_PRICE", "1000000".to_string()).parse().unwrap_or(rust_decimal::Decimal::new(1_000_000, 0)),
            max_leverage: env_or("MAX_LEVERAGE", 10),
            default_margin_requirement: env_or("DEFAULT_MARGIN_REQUIREMENT", "0.5".to_string())
                .parse()
                .unwrap_or(rust_decimal::Decimal::new(5, 1)),

            tick_event_retention: env_or("TICK_EVENT_RETENTION", 10_000),
            webhook_concurrency: env_or("WEBHOOK_CONCURRENCY", 64),
            regime_window_ticks: env_or("REGIME_WINDOW_TICKS", 50),

            starting_cash: env_or("STARTING_CASH", "100000".to_string())
                .parse()
                .unwrap_or(rust_decimal::Decimal::new(100_000, 0)),
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// `JWT_SECRET`/`API_SECRET` must both be present and at least 32 chars
/// (spec.md §6) so a brute-forced secret isn't a viable attack surface.
fn require_secret(key: &str) -> Result<String> {
    let value = std::env::var(key).map_err(|_| anyhow::anyhow!("{key} is required"))?;
    if value.len() < 32 {
        bail!("{key} must be at least 32 characters");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn rejects_short_secret() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("JWT_SECRET", "too-short");
        std::env::set_var("API_SECRET", "x".repeat(32));
        let result = Config::from_env();
        std::env::remove_var("JWT_SECRET");
        std::env::remove_var("API_SECRET");
        assert!(result.is_err());
    }

    #[test]
    fn accepts_secrets_of_sufficient_length() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("JWT_SECRET", "a".repeat(32));
        std::env::set_var("API_SECRET", "b".repeat(32));
        let result = Config::from_env();
        std::env::remove_var("JWT_SECRET");
        std::env::remove_var("API_SECRET");
        assert!(result.is_ok());
        assert_eq!(result.unwrap().max_leverage, 10);
    }

    #[test]
    fn debug_output_never_contains_the_raw_secrets() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("JWT_SECRET", "a".repeat(32));
        std::env::set_var("API_SECRET", "b".repeat(32));
        let config = Config::from_env().unwrap();
        std::env::remove_var("JWT_SECRET");
        std::env::remove_var("API_SECRET");

        let rendered = format!("{config:?}");
        assert!(!rendered.contains(&"a".repeat(32)));
        assert!(!rendered.contains(&"b".repeat(32)));
    }
}
