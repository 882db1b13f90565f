//! Relay Common - Shared configuration, errors and logging for deepseek-relay.
//!
//! This crate provides:
//! - Configuration types and loading (JSON file + environment)
//! - The unified error type
//! - Logging setup with noise filtering
//! - Small string helpers used by the other crates

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;

pub use config::{Config, LlmConfig, ObservabilityConfig, SessionConfig, TelegramConfig};
pub use error::{Error, Result};
