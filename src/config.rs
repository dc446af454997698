//! Cache configuration supplied by the filesystem-protocol layer.
//!
//! Object-level staleness (stat cache TTL) and name/kind-level staleness (type
//! cache TTL) are separate knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default TTL for both caches. TTLs too large to add to the current instant
/// never expire.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default stat cache capacity, in entries.
pub const DEFAULT_STAT_CACHE_CAPACITY: usize = 4096;

/// Default type cache capacity, in hints per directory.
pub const DEFAULT_TYPE_CACHE_CAPACITY: usize = 4096;

/// Default suffix exposing the file side of a file/directory name conflict.
/// A newline never appears in a legitimate object name component.
pub const DEFAULT_CONFLICT_SUFFIX: &str = "\n";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {var}: {value:?}")]
    Env { var: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    #[serde(rename = "statCacheTtlSecs", with = "duration_secs")]
    pub stat_cache_ttl: Duration,
    pub stat_cache_capacity: usize,
    #[serde(rename = "typeCacheTtlSecs", with = "duration_secs")]
    pub type_cache_ttl: Duration,
    pub type_cache_capacity: usize,
    /// Treat name prefixes of existing objects as directories even without a
    /// marker object.
    pub implicit_dirs: bool,
    pub conflict_suffix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stat_cache_ttl: DEFAULT_TTL,
            stat_cache_capacity: DEFAULT_STAT_CACHE_CAPACITY,
            type_cache_ttl: DEFAULT_TTL,
            type_cache_capacity: DEFAULT_TYPE_CACHE_CAPACITY,
            implicit_dirs: false,
            conflict_suffix: DEFAULT_CONFLICT_SUFFIX.to_string(),
        }
    }
}

impl CacheConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CacheConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `BUCKETFS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = CacheConfig::default();

        if let Some(secs) = parse_var::<u64, _>(&get, "BUCKETFS_STAT_CACHE_TTL_SECS")? {
            config.stat_cache_ttl = Duration::from_secs(secs);
        }
        if let Some(capacity) = parse_var::<usize, _>(&get, "BUCKETFS_STAT_CACHE_CAPACITY")? {
            config.stat_cache_capacity = capacity;
        }
        if let Some(secs) = parse_var::<u64, _>(&get, "BUCKETFS_TYPE_CACHE_TTL_SECS")? {
            config.type_cache_ttl = Duration::from_secs(secs);
        }
        if let Some(capacity) = parse_var::<usize, _>(&get, "BUCKETFS_TYPE_CACHE_CAPACITY")? {
            config.type_cache_capacity = capacity;
        }
        if let Some(enabled) = parse_var::<bool, _>(&get, "BUCKETFS_IMPLICIT_DIRS")? {
            config.implicit_dirs = enabled;
        }
        if let Some(suffix) = get("BUCKETFS_CONFLICT_SUFFIX") {
            config.conflict_suffix = suffix;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stat_cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "stat cache capacity must be at least 1".to_string(),
            ));
        }
        if self.type_cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "type cache capacity must be at least 1".to_string(),
            ));
        }
        if self.conflict_suffix.is_empty() {
            return Err(ConfigError::Invalid(
                "conflict suffix must not be empty".to_string(),
            ));
        }
        if self.conflict_suffix.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "conflict suffix {:?} must not contain '/'",
                self.conflict_suffix
            )));
        }
        Ok(())
    }
}

fn parse_var<T, F>(get: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Env {
                var: var.to_string(),
                value,
            }),
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
