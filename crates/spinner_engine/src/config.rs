use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fetch::{BodyDecoding, FetchSettings};

pub const DEFAULT_FAILURE_GLYPH: &str = "⁉️";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Shape of the deferred-content element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementSpec {
    pub tag_name: String,
    pub job_attribute: String,
    pub href_attribute: String,
    pub pending_class: String,
}

impl Default for ElementSpec {
    fn default() -> Self {
        Self {
            tag_name: "updating-spinner".to_string(),
            job_attribute: "data-run".to_string(),
            href_attribute: "href".to_string(),
            pending_class: "spinning".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let settings = FetchSettings::default();
        Self {
            connect_timeout_ms: settings.connect_timeout.as_millis() as u64,
            request_timeout_ms: settings.request_timeout.as_millis() as u64,
            redirect_limit: settings.redirect_limit,
            max_bytes: settings.max_bytes,
        }
    }
}

impl From<&FetchConfig> for FetchSettings {
    fn from(config: &FetchConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            redirect_limit: config.redirect_limit,
            max_bytes: config.max_bytes,
            decoding: BodyDecoding::default(),
        }
    }
}

/// Everything SpinnerSync needs to know about the page it drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub element: ElementSpec,
    /// Id of the element whose `href` names the notification endpoint.
    pub endpoint_link_id: String,
    pub failure_glyph: String,
    pub fetch: FetchConfig,
    /// Rewritten after every batch of document changes when set.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            element: ElementSpec::default(),
            endpoint_link_id: "ws_url".to_string(),
            failure_glyph: DEFAULT_FAILURE_GLYPH.to_string(),
            fetch: FetchConfig::default(),
            snapshot_path: None,
        }
    }
}

impl SyncConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&content)
    }

    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = ron::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings::from(&self.fetch)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let element = &self.element;
        for (name, value) in [
            ("element.tag_name", &element.tag_name),
            ("element.job_attribute", &element.job_attribute),
            ("element.href_attribute", &element.href_attribute),
            ("element.pending_class", &element.pending_class),
            ("endpoint_link_id", &self.endpoint_link_id),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }
        if element.pending_class.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "element.pending_class must be a single class name".to_string(),
            ));
        }
        // Attribute and tag names are matched in their parsed, lowercased form.
        if element.job_attribute != element.job_attribute.to_ascii_lowercase()
            || element.href_attribute != element.href_attribute.to_ascii_lowercase()
        {
            return Err(ConfigError::Invalid(
                "element attribute names must be lowercase".to_string(),
            ));
        }
        Ok(())
    }
}
