//! TOML-based configuration for chronoql.
//!
//! Supports a config file (chronoql.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! catalog = "${HOME}/tables.toml"
//!
//! [compiler]
//! max_order_by_columns = 1560
//! index_value_block_size = 256
//! synthesize_cross_join_sentinels = false
//!
//! [cache]
//! blocks = 8
//! rows = 64
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Catalog file to load tables from (supports ${ENV_VAR} expansion).
    pub catalog: Option<String>,

    pub compiler: CompilerSettings,

    pub cache: CacheSettings,
}

/// Knobs of the statement compiler.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Most columns one `order by` may list.
    pub max_order_by_columns: usize,

    /// Block size of indexed columns declared without `block size`.
    pub index_value_block_size: u32,

    /// Give every join left without criteria an `n = n` const-where sentinel.
    pub synthesize_cross_join_sentinels: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            max_order_by_columns: 1560,
            index_value_block_size: 256,
            synthesize_cross_join_sentinels: false,
        }
    }
}

/// Geometry of the compiled-statement cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub blocks: usize,
    pub rows: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { blocks: 8, rows: 64 }
    }
}

impl Settings {
    /// Parse settings from TOML text and validate them.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `CHRONOQL_CONFIG`
    /// 2. `./chronoql.toml`
    /// 3. `~/.config/chronoql/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("CHRONOQL_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("chronoql.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("chronoql").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.compiler.max_order_by_columns == 0 {
            return Err(SettingsError::InvalidConfig(
                "compiler.max_order_by_columns must be positive".into(),
            ));
        }
        if self.compiler.index_value_block_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "compiler.index_value_block_size must be positive".into(),
            ));
        }
        for (name, value) in [("cache.blocks", self.cache.blocks), ("cache.rows", self.cache.rows)] {
            if !value.is_power_of_two() {
                return Err(SettingsError::InvalidConfig(format!(
                    "{name} must be a power of two, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Catalog path with environment variables expanded.
    pub fn catalog_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.catalog
            .as_deref()
            .map(|path| expand_env_vars(path).map(PathBuf::from))
            .transpose()
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        let mut var_name = String::new();
        if chars.next_if_eq(&'{').is_some() {
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                var_name.push(ch);
            }
            if var_name.is_empty() {
                // A lone $ stays as written
                result.push('$');
                continue;
            }
        }
        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_braces() {
        env::set_var("CHRONOQL_TEST_VAR", "hello");
        assert_eq!(expand_env_vars("${CHRONOQL_TEST_VAR}").unwrap(), "hello");
        assert_eq!(
            expand_env_vars("prefix_${CHRONOQL_TEST_VAR}_suffix").unwrap(),
            "prefix_hello_suffix"
        );
        env::remove_var("CHRONOQL_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_no_braces() {
        env::set_var("CHRONOQL_TEST_VAR2", "world");
        assert_eq!(expand_env_vars("$CHRONOQL_TEST_VAR2").unwrap(), "world");
        assert_eq!(expand_env_vars("$CHRONOQL_TEST_VAR2!").unwrap(), "world!");
        assert_eq!(expand_env_vars("cost: $ 5").unwrap(), "cost: $ 5");
        env::remove_var("CHRONOQL_TEST_VAR2");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("${NONEXISTENT_VAR_12345}");
        assert!(matches!(result, Err(SettingsError::MissingEnvVar(name)) if name == "NONEXISTENT_VAR_12345"));
    }

    #[test]
    fn test_parse_toml() {
        let settings = Settings::from_toml_str(
            r#"
catalog = "./tables.toml"

[compiler]
max_order_by_columns = 3
synthesize_cross_join_sentinels = true

[cache]
rows = 16
"#,
        )
        .unwrap();

        assert_eq!(settings.compiler.max_order_by_columns, 3);
        assert_eq!(settings.compiler.index_value_block_size, 256);
        assert!(settings.compiler.synthesize_cross_join_sentinels);
        assert_eq!(settings.cache.blocks, 8);
        assert_eq!(settings.cache.rows, 16);
        assert_eq!(
            settings.catalog_path().unwrap(),
            Some(PathBuf::from("./tables.toml"))
        );
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.compiler.max_order_by_columns, 1560);
        assert!(!settings.compiler.synthesize_cross_join_sentinels);
        assert_eq!(settings.cache, CacheSettings { blocks: 8, rows: 64 });
        assert!(settings.catalog.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_geometry() {
        let err = Settings::from_toml_str("[cache]\nblocks = 6\n").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidConfig(msg) if msg.contains("cache.blocks")));

        let err = Settings::from_toml_str("[compiler]\nmax_order_by_columns = 0\n").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidConfig(_)));
    }
}
