use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DashError;

const SPECIES_SEPARATOR: char = '.';
const COMPONENT_SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceParts {
    pub species: String,
    pub network: String,
    pub site: String,
    pub inlet: String,
    pub instrument: String,
}

impl SourceParts {
    pub fn new(
        species: impl Into<String>,
        network: impl Into<String>,
        site: impl Into<String>,
        inlet: impl Into<String>,
        instrument: impl Into<String>,
    ) -> Self {
        Self {
            species: species.into(),
            network: network.into(),
            site: site.into(),
            inlet: inlet.into(),
            instrument: instrument.into(),
        }
    }

    fn named(&self) -> [(&'static str, &str); 5] {
        [
            ("species", &self.species),
            ("network", &self.network),
            ("site", &self.site),
            ("inlet", &self.inlet),
            ("instrument", &self.instrument),
        ]
    }
}

/// Canonical identifier of a source, shaped `species.network_site_inlet_instrument`.
///
/// Components are escaped so that `.`, `_` and `%` inside a component never
/// collide with the separators: two keys are equal exactly when their parts are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey {
    encoded: String,
    parts: SourceParts,
}

impl SourceKey {
    pub fn encode(parts: &SourceParts) -> Result<Self, DashError> {
        for (component, value) in parts.named() {
            if value.trim().is_empty() {
                return Err(DashError::InvalidComponent {
                    component,
                    value: value.to_string(),
                });
            }
        }

        let encoded = format!(
            "{}{SPECIES_SEPARATOR}{}{COMPONENT_SEPARATOR}{}{COMPONENT_SEPARATOR}{}{COMPONENT_SEPARATOR}{}",
            escape(&parts.species),
            escape(&parts.network),
            escape(&parts.site),
            escape(&parts.inlet),
            escape(&parts.instrument),
        );
        Ok(Self {
            encoded,
            parts: parts.clone(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn parts(&self) -> &SourceParts {
        &self.parts
    }

    pub fn species(&self) -> &str {
        &self.parts.species
    }

    pub fn with_species(&self, species: &str) -> Result<Self, DashError> {
        let mut parts = self.parts.clone();
        parts.species = species.to_string();
        Self::encode(&parts)
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encoded)
    }
}

impl FromStr for SourceKey {
    type Err = DashError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || DashError::InvalidSourceKey(value.to_string());

        let (species, rest) = value.split_once(SPECIES_SEPARATOR).ok_or_else(invalid)?;
        let fields = rest.split(COMPONENT_SEPARATOR).collect::<Vec<_>>();
        let [network, site, inlet, instrument] = fields.as_slice() else {
            return Err(invalid());
        };

        let parts = SourceParts {
            species: unescape(species).ok_or_else(invalid)?,
            network: unescape(network).ok_or_else(invalid)?,
            site: unescape(site).ok_or_else(invalid)?,
            inlet: unescape(inlet).ok_or_else(invalid)?,
            instrument: unescape(instrument).ok_or_else(invalid)?,
        };
        let key = Self::encode(&parts)?;
        // Rejects non-canonical spellings such as a needlessly escaped letter.
        if key.encoded != value {
            return Err(invalid());
        }
        Ok(key)
    }
}

impl Serialize for SourceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encoded)
    }
}

impl<'de> Deserialize<'de> for SourceKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for ch in component.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '.' => out.push_str("%2E"),
            '_' => out.push_str("%5F"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(component: &str) -> Option<String> {
    let mut out = String::with_capacity(component.len());
    let mut chars = component.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let code = [chars.next()?, chars.next()?];
        let decoded = match code {
            ['2', '5'] => '%',
            ['2', 'E'] => '.',
            ['5', 'F'] => '_',
            _ => return None,
        };
        out.push(decoded);
    }
    Some(out)
}
