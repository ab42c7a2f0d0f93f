//! Configuration structures for the jump monitor.
//!
//! Supports TOML deserialization with the same defaults as the command line:
//! a 100 ms threshold, every online CPU, and an unbounded run.

use crate::time::NS_PER_MSEC;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Highest CPU index (exclusive) a hexadecimal mask can address.
pub const MASK_CPU_LIMIT: usize = 64;

/// Default jump threshold in milliseconds.
pub const DEFAULT_THRESHOLD_MS: u64 = 100;

/// Validated run parameters.
///
/// Built once at startup and shared read-only with every worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Minimum gap between consecutive polls that counts as a jump.
    #[serde(with = "humantime_serde")]
    pub threshold: Duration,

    /// CPUs to monitor.
    pub cpus: CpuSelection,

    /// How long to run; zero runs until an external stop request.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Lock all memory pages before workers start (mlockall).
    pub lock_memory: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold: Duration::from_millis(DEFAULT_THRESHOLD_MS),
            cpus: CpuSelection::All,
            duration: Duration::ZERO,
            lock_memory: false,
        }
    }
}

impl MonitorConfig {
    /// Threshold in nanoseconds, saturating at `u64::MAX`.
    #[must_use]
    pub fn threshold_ns(&self) -> u64 {
        u64::try_from(self.threshold.as_nanos()).unwrap_or(u64::MAX)
    }

    /// Bounded run length, or `None` for an unbounded run.
    #[must_use]
    pub fn run_limit(&self) -> Option<Duration> {
        (!self.duration.is_zero()).then_some(self.duration)
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidThreshold`] for a zero threshold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold.is_zero() {
            return Err(ConfigError::InvalidThreshold(
                humantime::format_duration(self.threshold).to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or the result fails validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// Convert a command-line millisecond threshold.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidThreshold`] unless `ms` is strictly positive
/// and representable in nanoseconds.
pub fn threshold_from_millis(ms: i64) -> Result<Duration, ConfigError> {
    u64::try_from(ms)
        .ok()
        .filter(|&ms| ms > 0)
        .and_then(|ms| ms.checked_mul(NS_PER_MSEC))
        .map(Duration::from_nanos)
        .ok_or_else(|| ConfigError::InvalidThreshold(format!("{ms}ms")))
}

/// Which CPUs get a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CpuSelection {
    /// Every online CPU.
    #[default]
    All,
    /// CPUs whose bit is set; bit `n` selects CPU `n` for `n < 64`.
    Mask(u64),
}

impl CpuSelection {
    /// Build a selection from a raw mask. An empty mask selects every CPU.
    #[must_use]
    pub fn from_mask(mask: u64) -> Self {
        if mask == 0 {
            Self::All
        } else {
            Self::Mask(mask)
        }
    }

    /// Check whether `cpu` is selected, ignoring whether it is online.
    #[must_use]
    pub fn contains(&self, cpu: usize) -> bool {
        match self {
            Self::All => true,
            Self::Mask(mask) => cpu < MASK_CPU_LIMIT && mask & (1u64 << cpu) != 0,
        }
    }

    /// Intersect the selection with the online CPUs.
    ///
    /// Mask bits for CPUs that are not online are silently ignored.
    #[must_use]
    pub fn resolve(&self, online: &[usize]) -> Vec<usize> {
        online
            .iter()
            .copied()
            .filter(|&cpu| self.contains(cpu))
            .collect()
    }
}

impl fmt::Display for CpuSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Mask(mask) => write!(f, "{mask:#x}"),
        }
    }
}

impl FromStr for CpuSelection {
    type Err = ConfigError;

    /// Accepts `all` or a hexadecimal mask with an optional `0x` prefix.
    /// Digits above the low 64 bits are dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ConfigError::InvalidCpuMask(s.to_string()));
        }

        let low = &digits[digits.len().saturating_sub(16)..];
        let mask = u64::from_str_radix(low, 16)
            .map_err(|_| ConfigError::InvalidCpuMask(s.to_string()))?;
        Ok(Self::from_mask(mask))
    }
}

impl Serialize for CpuSelection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CpuSelection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct CpuSelectionVisitor;

        impl<'de> Visitor<'de> for CpuSelectionVisitor {
            type Value = CpuSelection;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("\"all\", a hexadecimal mask string, or an integer mask")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value.parse().map_err(de::Error::custom)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(CpuSelection::from_mask(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u64::try_from(value)
                    .map(CpuSelection::from_mask)
                    .map_err(|_| de::Error::custom("CPU mask cannot be negative"))
            }
        }

        deserializer.deserialize_any(CpuSelectionVisitor)
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Threshold is zero, negative, or too large.
    #[error("invalid threshold {0}: must be a positive number of milliseconds")]
    InvalidThreshold(String),

    /// CPU selection is neither `all` nor a hexadecimal mask.
    #[error("invalid CPU mask '{0}': expected 'all' or a hexadecimal mask")]
    InvalidCpuMask(String),

    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
