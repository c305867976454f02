//! Catalog configuration and data sources.

use crate::error::Result;
use chrono_tz::Tz;
use std::{env, fmt::Display, path::Path, str::FromStr};
use tracing::{info, warn};

pub const ENV_KEY_SEED: &str = "FESTA_KEY_SEED";
pub const ENV_TIMEZONE: &str = "FESTA_TIMEZONE";
pub const ENV_VERIFY_CHECKSUMS: &str = "FESTA_VERIFY_CHECKSUMS";

/// Runtime settings for opening a [`Catalog`](crate::Catalog).
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Obfuscation seed shared with the offline builder. Not a secret in any
    /// meaningful sense: it ships inside the client.
    pub key_seed: String,

    /// Zone in which `normalizedStart*`/`normalizedEnd*` fields are written.
    /// Default: Asia/Tokyo
    pub timezone: Tz,

    /// Verify whole-payload and per-bucket SHA-256 when the envelope has them.
    /// Default: true
    pub verify_checksums: bool,

    /// Results must lie within `radius × radius_slack` unless the search
    /// falls back to unfiltered results.
    /// Default: 1.2
    pub radius_slack: f64,

    /// Duration assumed for events with a start time but no end.
    /// Default: 2
    pub default_event_hours: i64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            key_seed: String::new(),
            timezone: chrono_tz::Asia::Tokyo,
            verify_checksums: true,
            radius_slack: 1.2,
            default_event_hours: 2,
        }
    }
}

impl CatalogConfig {
    /// Defaults with the given obfuscation seed.
    pub fn new(key_seed: impl Into<String>) -> Self {
        Self::default().with_key_seed(key_seed)
    }

    /// Loads settings from `FESTA_*` environment variables, keeping the
    /// default for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            key_seed: var(ENV_KEY_SEED).unwrap_or_else(|| {
                warn!("{ENV_KEY_SEED} not set, frames will only decode if built with an empty seed");
                String::new()
            }),
            timezone: try_load(ENV_TIMEZONE, defaults.timezone),
            verify_checksums: try_load(ENV_VERIFY_CHECKSUMS, defaults.verify_checksums),
            ..defaults
        }
    }

    pub fn with_key_seed(mut self, key_seed: impl Into<String>) -> Self {
        self.key_seed = key_seed.into();
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr + Display>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    let Some(raw) = var(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };
    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
        default
    })
}

/// Raw envelope and payload bytes, however the host obtained them.
#[derive(Debug, Clone, Default)]
pub struct CatalogSources {
    pub envelope: Vec<u8>,
    pub payload: Vec<u8>,
}

impl CatalogSources {
    pub fn new(envelope: Vec<u8>, payload: Vec<u8>) -> Self {
        Self { envelope, payload }
    }

    /// Reads both files. Without an explicit payload path, the envelope's
    /// `payloadFile` is resolved next to the envelope.
    pub fn from_paths(envelope_path: impl AsRef<Path>, payload_path: Option<&Path>) -> Result<Self> {
        let envelope_path = envelope_path.as_ref();
        let envelope = std::fs::read(envelope_path)?;

        let payload_path = match payload_path {
            Some(path) => path.to_path_buf(),
            None => {
                #[derive(serde::Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct PayloadName {
                    payload_file: String,
                }
                let name: PayloadName = serde_json::from_slice(&envelope)?;
                envelope_path
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(name.payload_file)
            }
        };

        let payload = std::fs::read(&payload_path)?;
        info!(
            envelope = %envelope_path.display(),
            payload = %payload_path.display(),
            bytes = payload.len(),
            "read catalog sources"
        );
        Ok(Self { envelope, payload })
    }
}
