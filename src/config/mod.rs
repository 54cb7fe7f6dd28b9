//! Configuration module for chronoql.
//!
//! Handles compiler and cache settings and environment variable expansion.

mod settings;

pub use settings::{expand_env_vars, CacheSettings, CompilerSettings, Settings, SettingsError};
