//! Server configuration: a YAML document plus a `PORT` environment
//! override.
//!
//! A missing config file is not an error; the built-in defaults describe a
//! development server on `0.0.0.0:9000` storing under `./data`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// `host:port` the server binds.
    pub listen_address: String,
    /// TLS listener settings.
    pub tls: TlsConfig,
    /// Storage engine settings.
    pub storage: StorageConfig,
    /// The static credential pair.
    pub auth: AuthConfig,
    /// Logging settings.
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TlsConfig {
    /// Whether to terminate TLS.
    pub enabled: bool,
    /// PEM certificate chain path.
    pub cert_path: Option<PathBuf>,
    /// PEM private key path.
    pub key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Storage root; created if missing, absolutized during validation.
    pub root_path: PathBuf,
    /// Advisory per-object size cap in bytes. Zero disables the cap.
    pub max_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AuthConfig {
    /// Access key ID clients sign with.
    pub access_key: String,
    /// Secret key; at least 8 bytes.
    pub secret_key: String,
    /// Reject requests whose `x-amz-date` deviates from now by more than
    /// this many seconds. Absent means no skew check.
    pub max_clock_skew_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LogConfig {
    /// Log level filter: `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Log output format.
    pub format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON lines.
    Json,
    /// Human-readable text.
    Text,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:9000".to_owned(),
            tls: TlsConfig::default(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("./data"),
            max_size_bytes: 100 * 1024 * 1024 * 1024,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_key: "porterfs".to_owned(),
            secret_key: "porterfs".to_owned(),
            max_clock_skew_seconds: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Json,
        }
    }
}

impl Config {
    /// Load the configuration from a YAML file. A missing file yields the
    /// defaults; an unreadable or unparsable file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("cannot read config {}", path.display()));
            }
        };
        serde_yaml::from_str(&raw)
            .with_context(|| format!("cannot parse config {}", path.display()))
    }

    /// Validate and normalize: create and absolutize the storage root,
    /// check the secret length, and require TLS material when TLS is on.
    pub fn validate(&mut self) -> Result<()> {
        if self.auth.secret_key.len() < 8 {
            bail!("auth.secret-key must be at least 8 bytes");
        }

        std::fs::create_dir_all(&self.storage.root_path).with_context(|| {
            format!(
                "cannot create storage root {}",
                self.storage.root_path.display()
            )
        })?;
        self.storage.root_path = self
            .storage
            .root_path
            .canonicalize()
            .context("cannot resolve storage root")?;

        if self.tls.enabled {
            if self.tls.cert_path.is_none() {
                bail!("tls.cert-path is required when TLS is enabled");
            }
            if self.tls.key_path.is_none() {
                bail!("tls.key-path is required when TLS is enabled");
            }
        }
        Ok(())
    }

    /// The effective bind address: `PORT` in the environment replaces the
    /// configured port.
    #[must_use]
    pub fn effective_listen_address(&self) -> String {
        match std::env::var("PORT") {
            Ok(port) if !port.is_empty() => {
                let host = self
                    .listen_address
                    .rsplit_once(':')
                    .map_or("0.0.0.0", |(host, _)| host);
                format!("{host}:{port}")
            }
            _ => self.listen_address.clone(),
        }
    }

    /// The advisory object size cap, `None` when disabled.
    #[must_use]
    pub fn max_object_size(&self) -> Option<u64> {
        (self.storage.max_size_bytes > 0).then_some(self.storage.max_size_bytes)
    }
}
