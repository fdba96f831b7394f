use std::fs;
use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::dashboard::FetchMode;
use crate::defaults::DefaultPolicy;
use crate::error::DashError;
use crate::remote::RemoteClient;

pub const CONFIG_FILE: &str = "ghg-dashboard.json";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    pub repository_base_url: String,
    pub catalogue: LocationEntry,
    #[serde(default)]
    pub defaults: Option<LocationEntry>,
    #[serde(default)]
    pub default_policy: Option<DefaultPolicy>,
    #[serde(default)]
    pub species_labels: Option<LocationEntry>,
    #[serde(default)]
    pub fetch_mode: Option<FetchMode>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LocationEntry {
    Shorthand(String),
    Detailed(LocationObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LocationObject {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(Utf8PathBuf),
    Url(String),
}

impl Location {
    pub fn parse(entry: LocationEntry) -> Result<Self, DashError> {
        match entry {
            LocationEntry::Shorthand(value) => {
                let value = value.trim();
                if value.is_empty() {
                    return Err(DashError::ConfigParse("empty location".to_string()));
                }
                if value.starts_with("http://") || value.starts_with("https://") {
                    Ok(Location::Url(value.to_string()))
                } else {
                    Ok(Location::File(Utf8PathBuf::from(value)))
                }
            }
            LocationEntry::Detailed(LocationObject {
                path: Some(path),
                url: None,
            }) => Ok(Location::File(Utf8PathBuf::from(path))),
            LocationEntry::Detailed(LocationObject {
                path: None,
                url: Some(url),
            }) => Ok(Location::Url(url)),
            LocationEntry::Detailed(_) => Err(DashError::ConfigParse(
                "location needs exactly one of `path` or `url`".to_string(),
            )),
        }
    }

    pub fn relative_to(self, base: &Utf8Path) -> Self {
        match self {
            Location::File(path) if path.is_relative() => Location::File(base.join(path)),
            other => other,
        }
    }

    pub fn load_json(&self, client: &dyn RemoteClient) -> Result<Value, DashError> {
        match self {
            Location::File(path) => {
                let content = fs::read_to_string(path.as_std_path())
                    .map_err(|err| DashError::Filesystem(format!("read {path}: {err}")))?;
                serde_json::from_str(&content)
                    .map_err(|err| DashError::Filesystem(format!("parse {path}: {err}")))
            }
            Location::Url(url) => client.get_json(url),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::File(path) => write!(f, "{path}"),
            Location::Url(url) => write!(f, "{url}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub repository_base_url: String,
    pub catalogue: Location,
    pub defaults: Option<Location>,
    pub default_policy: DefaultPolicy,
    pub species_labels: Option<Location>,
    pub fetch_mode: FetchMode,
}

impl ResolvedConfig {
    /// Rebases relative file locations onto `base`, the config file's directory.
    pub fn relative_to(self, base: &Utf8Path) -> Self {
        Self {
            catalogue: self.catalogue.relative_to(base),
            defaults: self.defaults.map(|location| location.relative_to(base)),
            species_labels: self.species_labels.map(|location| location.relative_to(base)),
            ..self
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, DashError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(DashError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| DashError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| DashError::ConfigParse(err.to_string()))?;

        let resolved = Self::resolve_config(config)?;
        let Some(parent) = config_path.parent() else {
            return Ok(resolved);
        };
        match Utf8Path::from_path(parent) {
            Some(base) => Ok(resolved.relative_to(base)),
            None => {
                warn!(
                    path = %parent.display(),
                    "config directory is not UTF-8; file locations stay relative to the working directory"
                );
                Ok(resolved)
            }
        }
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, DashError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let repository_base_url = config.repository_base_url.trim().to_string();
        if repository_base_url.is_empty() {
            return Err(DashError::ConfigParse(
                "repository_base_url must not be empty".to_string(),
            ));
        }

        let catalogue = Location::parse(config.catalogue)?;
        let defaults = config.defaults.map(Location::parse).transpose()?;
        let species_labels = config.species_labels.map(Location::parse).transpose()?;
        let default_policy = config.default_policy.unwrap_or(if defaults.is_some() {
            DefaultPolicy::ExplicitDefaults
        } else {
            DefaultPolicy::TraversalOrder
        });

        Ok(ResolvedConfig {
            schema_version,
            repository_base_url,
            catalogue,
            defaults,
            default_policy,
            species_labels,
            fetch_mode: config.fetch_mode.unwrap_or_default(),
        })
    }
}
