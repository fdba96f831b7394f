use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::catalogue::CatalogueIndex;
use crate::domain::{SourceKey, SourceParts};
use crate::error::DashError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultPolicy {
    ExplicitDefaults,
    TraversalOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultsDocument {
    pub species: String,
    pub network: String,
    pub site: String,
    pub inlet: String,
    pub instrument: String,
}

impl DefaultsDocument {
    pub fn parts(&self) -> SourceParts {
        SourceParts::new(
            self.species.as_str(),
            self.network.as_str(),
            self.site.as_str(),
            self.inlet.as_str(),
            self.instrument.as_str(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDefaults {
    pub species: String,
    pub network: String,
    pub site: String,
    pub inlet: String,
    pub instrument: String,
    pub source_key: SourceKey,
    pub policy: DefaultPolicy,
}

impl ResolvedDefaults {
    fn from_key(source_key: SourceKey, policy: DefaultPolicy) -> Self {
        let parts = source_key.parts().clone();
        Self {
            species: parts.species,
            network: parts.network,
            site: parts.site,
            inlet: parts.inlet,
            instrument: parts.instrument,
            source_key,
            policy,
        }
    }
}

pub fn resolve_defaults(
    catalogue: &CatalogueIndex,
    policy: DefaultPolicy,
    document: Option<&Value>,
) -> Option<ResolvedDefaults> {
    if policy == DefaultPolicy::ExplicitDefaults {
        let explicit = document
            .ok_or_else(|| DashError::DefaultsConfig("no defaults document available".to_string()))
            .and_then(|document| explicit_defaults(catalogue, document));
        match explicit {
            Ok(defaults) => {
                info!(key = %defaults.source_key, "using explicit defaults");
                return Some(defaults);
            }
            Err(err) => warn!(error = %err, "falling back to traversal-order defaults"),
        }
    }
    traversal_defaults(catalogue)
}

pub fn explicit_defaults(
    catalogue: &CatalogueIndex,
    document: &Value,
) -> Result<ResolvedDefaults, DashError> {
    let parsed: DefaultsDocument = serde_json::from_value(document.clone())
        .map_err(|err| DashError::DefaultsConfig(err.to_string()))?;
    let key = SourceKey::encode(&parsed.parts())
        .map_err(|err| DashError::DefaultsConfig(err.to_string()))?;
    if !catalogue.contains(&key) {
        return Err(DashError::DefaultsConfig(format!(
            "source {key} is not in the catalogue"
        )));
    }
    Ok(ResolvedDefaults::from_key(key, DefaultPolicy::ExplicitDefaults))
}

pub fn traversal_defaults(catalogue: &CatalogueIndex) -> Option<ResolvedDefaults> {
    catalogue
        .default_source_key()
        .cloned()
        .map(|key| ResolvedDefaults::from_key(key, DefaultPolicy::TraversalOrder))
}
