//! Run configuration, loadable from TOML.
//!
//! Every field has a default so a file only names what it changes:
//!
//! ```toml
//! service_root = "https://services.odata.org/V4/OData/OData.svc/"
//! format = "json"
//! categories = ["core", "entry"]
//! max_resources = 10
//!
//! [headers]
//! Authorization = "Bearer token"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::fetch::DEFAULT_MAX_BYTES;
use crate::rules::Category;

/// Service root assumed for offline runs that name none.
pub const OFFLINE_SERVICE_ROOT: &str = "http://localhost/";

/// Errors raised while loading or validating a [`RunConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not valid TOML or has unknown keys.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// A URI field does not parse as an absolute URI.
    #[error("`{field}` is not an absolute URI: {value:?}")]
    InvalidUri {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// A limit that must be positive is zero.
    #[error("`{0}` must be greater than zero")]
    ZeroLimit(&'static str),
    /// Live runs need somewhere to start.
    #[error("`service_root` is required unless an offline payload is configured")]
    MissingServiceRoot,
}

/// Payload dialect requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// AtomPub / XML.
    Atom,
    /// JSON light (V3 minimal metadata, V4 JSON).
    #[default]
    Json,
    /// V1/V2 verbose JSON.
    JsonVerbose,
}

impl Format {
    /// `Accept` header value for this dialect.
    #[must_use]
    pub fn accept(self) -> &'static str {
        match self {
            Self::Atom => "application/atom+xml,application/xml;q=0.9,*/*;q=0.1",
            Self::Json => "application/json;odata.metadata=minimal,application/json;odata=minimalmetadata;q=0.9,application/json;q=0.8",
            Self::JsonVerbose => "application/json;odata=verbose,application/json;q=0.8",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atom" | "xml" => Ok(Self::Atom),
            "json" => Ok(Self::Json),
            "jsonverbose" | "verbose" => Ok(Self::JsonVerbose),
            other => Err(format!("unknown format `{other}` (expected atom, json or jsonverbose)")),
        }
    }
}

/// Payloads read from disk instead of fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OfflineConfig {
    /// A payload file, or a directory checked file by file.
    pub payload: PathBuf,
    /// Metadata document for the payloads.
    #[serde(default)]
    pub metadata: Option<PathBuf>,
    /// Content type to assume; guessed from the extension when absent.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Request URI the payload was retrieved from.
    #[serde(default)]
    pub uri: Option<String>,
}

/// Everything a conformance run needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Root of the service under test.
    #[serde(default)]
    pub service_root: String,
    /// Resource to start from; the service root when absent.
    #[serde(default)]
    pub target: Option<String>,
    /// `Accept` header; derived from `format` when absent.
    #[serde(default)]
    pub accept: Option<String>,
    /// Requested payload dialect.
    #[serde(default)]
    pub format: Format,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Response body cap in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    /// Rule categories to run; empty runs all.
    #[serde(default)]
    pub categories: Vec<Category>,
    /// Upper bound on resources fetched by the crawl.
    #[serde(default = "default_max_resources")]
    pub max_resources: usize,
    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Offline mode.
    #[serde(default)]
    pub offline: Option<OfflineConfig>,
    /// Run rules on a thread pool.
    #[serde(default = "default_true")]
    pub parallel: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_bytes() -> usize {
    DEFAULT_MAX_BYTES
}

fn default_max_resources() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            service_root: String::new(),
            target: None,
            accept: None,
            format: Format::default(),
            timeout_secs: default_timeout_secs(),
            max_bytes: default_max_bytes(),
            categories: Vec::new(),
            max_resources: default_max_resources(),
            headers: BTreeMap::new(),
            offline: None,
            parallel: true,
        }
    }
}

impl RunConfig {
    /// Reads a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it is not a valid configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Checks URIs and limits.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.service_root_url()?;
        self.target_uri()?;
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroLimit("timeout_secs"));
        }
        if self.max_bytes == 0 {
            return Err(ConfigError::ZeroLimit("max_bytes"));
        }
        if self.max_resources == 0 {
            return Err(ConfigError::ZeroLimit("max_resources"));
        }
        Ok(())
    }

    /// The service root, normalised to end with `/`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingServiceRoot`] for live runs without a
    /// root and [`ConfigError::InvalidUri`] when it does not parse.
    pub fn service_root_url(&self) -> Result<Url, ConfigError> {
        let raw = self.service_root.trim();
        let raw = match (raw.is_empty(), self.offline.is_some()) {
            (false, _) => raw,
            (true, true) => OFFLINE_SERVICE_ROOT,
            (true, false) => return Err(ConfigError::MissingServiceRoot),
        };
        let mut url = parse_absolute("service_root", raw)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    /// The first resource to check, resolved against the service root.
    ///
    /// # Errors
    ///
    /// Fails as [`RunConfig::service_root_url`] does, or with
    /// [`ConfigError::InvalidUri`] when the target does not resolve.
    pub fn target_uri(&self) -> Result<String, ConfigError> {
        let root = self.service_root_url()?;
        match self.target.as_deref().map(str::trim) {
            None | Some("") => Ok(root.to_string()),
            Some(target) => root
                .join(target)
                .map(String::from)
                .map_err(|_| ConfigError::InvalidUri {
                    field: "target",
                    value: target.to_string(),
                }),
        }
    }

    /// `Accept` header to send.
    #[must_use]
    pub fn accept_header(&self) -> String {
        self.accept
            .clone()
            .unwrap_or_else(|| self.format.accept().to_string())
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_absolute(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value)
        .ok()
        .filter(|url| !url.cannot_be_a_base())
        .ok_or_else(|| ConfigError::InvalidUri {
            field,
            value: value.to_string(),
        })
}
