//! Engine configuration: how many dataflow workers to run, whether reads wait for a consistent
//! view, where the database lives on disk, and which crypto backend encrypts it.

use crate::crypto::CryptoBackend;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// -------------------------------------------------------------------------------------------------
//
/// Top-level engine configuration, deserializable from a TOML file.
///
/// ```toml
/// db_name = "shop"
/// db_dir = "/var/lib/k9shard"
/// workers = 4
/// consistent = true
/// crypto_backend = "aes-256-gcm"
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Logical name of the database; also used as the on-disk file stem under `db_dir`.
    pub db_name: String,

    /// Directory the `redb` file and any write-ahead state live under.
    pub db_dir: PathBuf,

    /// Number of dataflow worker threads (spec.md §5). The original engine defaults to 3.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Whether `SELECT` waits on a [`crate::dataflow::future::Promise`] for full consistency before
    /// returning, or returns whatever partial state the dataflow graph has reached so far.
    #[serde(default = "default_consistent")]
    pub consistent: bool,

    #[serde(default)]
    pub crypto_backend: ConfiguredBackend,
}

const fn default_workers() -> usize {
    3
}

const fn default_consistent() -> bool {
    true
}

impl EngineConfig {
    /// Parses `text` as TOML. Does not itself enforce [`Self::validate`]'s invariants — callers
    /// that intend to open a connection from the result should call it explicitly.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if `text` is not valid TOML or is missing required fields.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::ConfigError(e.to_string()))
    }

    /// # Errors
    /// Returns [`Error::ConfigError`] if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::ConfigError(e.to_string()))?;
        Self::from_toml(&text)
    }

    /// # Errors
    /// Returns [`Error::ConfigError`] if `workers` is zero, or `db_name` is empty.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::ConfigError("workers must be at least 1".into()));
        }
        if self.db_name.trim().is_empty() {
            return Err(Error::ConfigError("db_name must not be empty".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.db_dir.join(format!("{}.redb", self.db_name))
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Serde-friendly mirror of [`CryptoBackend`]; kept distinct so the wire/config format (lowercase,
/// hyphenated names) doesn't have to track the Rust enum's variant spelling.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfiguredBackend {
    #[default]
    Aes256Gcm,
    ChaCha20,
    Plaintext,
}

impl From<ConfiguredBackend> for CryptoBackend {
    fn from(backend: ConfiguredBackend) -> Self {
        match backend {
            ConfiguredBackend::Aes256Gcm => Self::Aes256Gcm,
            ConfiguredBackend::ChaCha20 => Self::ChaCha20,
            ConfiguredBackend::Plaintext => Self::Plaintext,
        }
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml_with_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            db_name = "shop"
            db_dir = "/var/lib/k9shard"
            "#,
        )
        .unwrap();
        assert_eq!(config.workers, 3);
        assert!(config.consistent);
        assert_eq!(config.crypto_backend, ConfiguredBackend::Aes256Gcm);
    }

    #[test]
    fn rejects_zero_workers() {
        let config = EngineConfig::from_toml(
            r#"
            db_name = "shop"
            db_dir = "/var/lib/k9shard"
            workers = 0
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_fields() {
        let result = EngineConfig::from_toml(
            r#"
            db_name = "shop"
            db_dir = "/var/lib/k9shard"
            typo_field = true
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn db_path_joins_dir_and_name() {
        let config = EngineConfig::from_toml(
            r#"
            db_name = "shop"
            db_dir = "/var/lib/k9shard"
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/k9shard/shop.redb"));
    }
}
