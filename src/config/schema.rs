//! Configuration schema types
//!
//! These types are deserialized from the YAML description of a cache
//! container. Attribute values stay as raw text here; turning them into
//! typed modes is the resolver's job, so a bad token surfaces as a
//! validation issue that names the field instead of a generic parse error.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::resolver::{
    ConfigurationRequest, DEFAULT_STOP_TIMEOUT_MS, LockingMode, TransactionConfigResolver,
    TransactionMode,
};

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration of a cache container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ContainerConfig {
    /// Container metadata (required)
    pub container: ContainerMetadata,

    /// Transaction services the environment provides
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Caches in declaration order
    #[serde(default)]
    pub caches: IndexMap<String, CacheConfig>,
}

/// Container identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ContainerMetadata {
    /// Container name (required)
    pub name: String,
}

/// Names of the transaction services available to the container.
///
/// An absent entry means the environment has no such service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Transaction manager service name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_manager: Option<String>,

    /// Transaction synchronization registry service name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synchronization_registry: Option<String>,
}

// ============================================================================
// Cache Configuration
// ============================================================================

/// Configuration of one cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CacheConfig {
    /// Transaction attributes; every attribute has a default
    #[serde(default)]
    pub transaction: TransactionAttributes,
}

/// Raw transaction attributes of a cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TransactionAttributes {
    /// Transaction mode token (default `NONE`)
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Locking mode token (default `PESSIMISTIC`)
    #[serde(default = "default_locking")]
    pub locking: String,

    /// Stop timeout (default 10000 ms)
    #[serde(default)]
    pub stop_timeout: StopTimeoutValue,
}

fn default_mode() -> String {
    TransactionMode::default().as_str().to_string()
}

fn default_locking() -> String {
    LockingMode::default().as_str().to_string()
}

impl Default for TransactionAttributes {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            locking: default_locking(),
            stop_timeout: StopTimeoutValue::default(),
        }
    }
}

impl TransactionAttributes {
    /// Validates these attributes through `resolver`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidConfiguration`] for the first invalid
    /// attribute, in the order mode, locking, stop timeout.
    pub fn to_request(
        &self,
        resolver: &TransactionConfigResolver,
    ) -> Result<ConfigurationRequest, ResolveError> {
        match self.stop_timeout.to_millis() {
            Ok(stop_timeout_ms) => resolver.configure(&self.mode, &self.locking, stop_timeout_ms),
            Err(timeout_err) => {
                // mode and locking errors outrank an unreadable timeout
                resolver.configure(&self.mode, &self.locking, 0)?;
                Err(resolver.reject(timeout_err))
            }
        }
    }
}

/// Stop timeout as written: plain milliseconds or a duration string such as
/// `"30s"` or `"1m 30s"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopTimeoutValue {
    /// Milliseconds; may be negative so the resolver can reject it.
    Millis(i64),
    /// Duration text, or a number that arrived as a string.
    Text(String),
}

impl Default for StopTimeoutValue {
    fn default() -> Self {
        Self::Millis(i64::try_from(DEFAULT_STOP_TIMEOUT_MS).unwrap_or(i64::MAX))
    }
}

impl StopTimeoutValue {
    /// Converts to milliseconds without checking the sign.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidConfiguration`] when the text is
    /// neither an integer nor a duration, or overflows.
    pub fn to_millis(&self) -> Result<i64, ResolveError> {
        match self {
            Self::Millis(ms) => Ok(*ms),
            Self::Text(text) => {
                let trimmed = text.trim();
                if let Ok(ms) = trimmed.parse::<i64>() {
                    return Ok(ms);
                }
                humantime::parse_duration(trimmed)
                    .ok()
                    .and_then(|d| i64::try_from(d.as_millis()).ok())
                    .ok_or_else(|| {
                        ResolveError::invalid(
                            "stop-timeout",
                            text.clone(),
                            "milliseconds or a duration such as \"10s\"",
                        )
                    })
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
