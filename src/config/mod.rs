//! Application configuration.
//!
//! Loads and validates configuration from environment variables the way
//! `backend/src/config/environment.rs` does for the Giving Block backend:
//! fail fast at startup with a clear message rather than at first use.

pub mod settings;

pub use settings::Settings;
