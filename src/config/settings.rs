//! Environment-sourced settings.
//!
//! Loaded once at startup via [`Settings::from_env`]. Panics with a clear
//! message on a missing required variable, mirroring
//! `config::environment::get_tgb_api_key` in the teacher backend.

use rust_decimal::Decimal;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub gateway_hmac_secret: String,

    pub entry_fee_cap_min: Decimal,
    pub entry_fee_cap_max: Decimal,
    pub deposit_cap_min: Decimal,
    pub deposit_cap_max: Decimal,
    pub min_withdrawal: Decimal,
    pub platform_fee_rate: Decimal,

    pub matchmaker_tick: Duration,
    pub fast_ludo_timer_2p: Duration,
    pub fast_ludo_timer_multi: Duration,
    pub memory_turn_timer: Duration,
    pub memory_lifelines: u8,
    pub memory_default_pairs: u8,

    pub room_grace_period: Duration,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn decimal_env(key: &str, default: &str) -> Decimal {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| default.parse().expect("default decimal literal is valid"))
}

impl Settings {
    /// Loads settings from the process environment (and `.env` if present).
    ///
    /// # Panics
    /// Panics if `DATABASE_URL` or `GATEWAY_HMAC_SECRET` are missing, since
    /// the service cannot run without durable storage or the ability to
    /// verify deposit signatures.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment or .env file");
        let gateway_hmac_secret = env::var("GATEWAY_HMAC_SECRET")
            .expect("GATEWAY_HMAC_SECRET must be set in environment or .env file");

        Settings {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            database_url,
            gateway_hmac_secret,

            entry_fee_cap_min: decimal_env("ENTRY_FEE_CAP_MIN", "0"),
            entry_fee_cap_max: decimal_env("ENTRY_FEE_CAP_MAX", "10000"),
            deposit_cap_min: decimal_env("DEPOSIT_CAP_MIN", "10"),
            deposit_cap_max: decimal_env("DEPOSIT_CAP_MAX", "50000"),
            min_withdrawal: decimal_env("MIN_WITHDRAWAL", "100"),
            platform_fee_rate: decimal_env("PLATFORM_FEE_RATE", "0.10"),

            matchmaker_tick: Duration::from_secs(
                env_or("MATCHMAKER_TICK_SECONDS", "5").parse().unwrap_or(5),
            ),
            fast_ludo_timer_2p: Duration::from_secs(300),
            fast_ludo_timer_multi: Duration::from_secs(600),
            memory_turn_timer: Duration::from_secs(15),
            memory_lifelines: 3,
            memory_default_pairs: 15,

            room_grace_period: Duration::from_secs(
                env_or("ROOM_GRACE_PERIOD_SECONDS", "120").parse().unwrap_or(120),
            ),
        }
    }

    /// Validates all required configuration is present and sane.
    ///
    /// # Panics
    /// Panics with a descriptive message if any invariant is violated —
    /// this should run once at startup, before the server starts accepting
    /// connections.
    pub fn validate(&self) {
        assert!(
            self.entry_fee_cap_min <= self.entry_fee_cap_max,
            "ENTRY_FEE_CAP_MIN must be <= ENTRY_FEE_CAP_MAX"
        );
        assert!(
            self.deposit_cap_min <= self.deposit_cap_max,
            "DEPOSIT_CAP_MIN must be <= DEPOSIT_CAP_MAX"
        );
        assert!(
            !self.gateway_hmac_secret.is_empty(),
            "GATEWAY_HMAC_SECRET must not be empty"
        );
    }
}
