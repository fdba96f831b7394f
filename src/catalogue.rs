use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::cache::DataStore;
use crate::domain::{SourceKey, SourceParts};
use crate::error::DashError;

const LEVELS: [&str; 5] = ["species", "network", "site", "inlet", "instrument"];

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct SourceMetadata(Map<String, Value>);

impl SourceMetadata {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn units(&self) -> Option<&str> {
        self.text("units")
    }

    pub fn long_name(&self) -> Option<&str> {
        self.text("long_name")
    }

    pub fn station(&self) -> Option<&str> {
        self.text("station").or_else(|| self.text("site"))
    }

    pub fn latitude(&self) -> Option<f64> {
        self.number("latitude")
    }

    pub fn longitude(&self) -> Option<f64> {
        self.number("longitude")
    }

    pub fn inlet_height(&self) -> Option<String> {
        ["magl", "inlet"]
            .iter()
            .filter_map(|field| self.0.get(*field))
            .find_map(|value| match value {
                Value::String(text) if !text.is_empty() && text != "NA" => Some(text.clone()),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            })
    }

    fn text(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|value| value.as_str())
    }

    fn number(&self, field: &str) -> Option<f64> {
        match self.0.get(field)? {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogueEntry {
    pub filepath: String,
    pub metadata: SourceMetadata,
}

impl CatalogueEntry {
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| "entry is not an object".to_string())?;
        let filepath = object
            .get("filepath")
            .or_else(|| object.get("filename"))
            .and_then(|value| value.as_str())
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .ok_or_else(|| "missing filepath".to_string())?;
        let metadata = object
            .get("metadata")
            .and_then(|value| value.as_object())
            .ok_or_else(|| "missing metadata object".to_string())?;

        Ok(Self {
            filepath: filepath.to_string(),
            metadata: SourceMetadata::new(metadata.clone()),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Level<T> {
    branches: Vec<(String, T)>,
    positions: HashMap<String, usize>,
}

impl<T> Default for Level<T> {
    fn default() -> Self {
        Self {
            branches: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<T> Level<T> {
    pub fn get(&self, name: &str) -> Option<&T> {
        self.positions
            .get(name)
            .map(|&position| &self.branches[position].1)
    }

    pub fn first(&self) -> Option<(&str, &T)> {
        self.branches
            .first()
            .map(|(name, child)| (name.as_str(), child))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.branches
            .iter()
            .map(|(name, child)| (name.as_str(), child))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.branches.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    fn entry_or_default(&mut self, name: &str) -> &mut T
    where
        T: Default,
    {
        let position = match self.positions.get(name) {
            Some(&position) => position,
            None => {
                let position = self.branches.len();
                self.branches.push((name.to_string(), T::default()));
                self.positions.insert(name.to_string(), position);
                position
            }
        };
        &mut self.branches[position].1
    }
}

impl<T: Serialize> Serialize for Level<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.branches.len()))?;
        for (name, child) in &self.branches {
            map.serialize_entry(name, child)?;
        }
        map.end()
    }
}

pub type InstrumentLevel = Level<Option<SourceKey>>;
pub type InletLevel = Level<InstrumentLevel>;
pub type SiteLevel = Level<InletLevel>;
pub type NetworkLevel = Level<SiteLevel>;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct SiteStructure {
    species: Level<NetworkLevel>,
}

impl SiteStructure {
    pub fn insert(&mut self, key: SourceKey) {
        let parts = key.parts().clone();
        let slot = self
            .species
            .entry_or_default(&parts.species)
            .entry_or_default(&parts.network)
            .entry_or_default(&parts.site)
            .entry_or_default(&parts.inlet)
            .entry_or_default(&parts.instrument);
        *slot = Some(key);
    }

    pub fn lookup(&self, parts: &SourceParts) -> Option<&SourceKey> {
        self.species
            .get(&parts.species)?
            .get(&parts.network)?
            .get(&parts.site)?
            .get(&parts.inlet)?
            .get(&parts.instrument)?
            .as_ref()
    }

    pub fn contains(&self, key: &SourceKey) -> bool {
        self.lookup(key.parts()).is_some()
    }

    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.species.names()
    }

    pub fn networks(&self, species: &str) -> Option<&NetworkLevel> {
        self.species.get(species)
    }

    pub fn contains_species(&self, species: &str) -> bool {
        self.species.get(species).is_some()
    }

    pub fn sources<'a>(&'a self, species: &str) -> Vec<&'a SourceKey> {
        let Some(networks) = self.species.get(species) else {
            return Vec::new();
        };
        networks
            .iter()
            .flat_map(|(_, sites)| sites.iter())
            .flat_map(|(_, inlets)| inlets.iter())
            .flat_map(|(_, instruments)| instruments.iter())
            .filter_map(|(_, key)| key.as_ref())
            .collect()
    }

    pub fn first_source(&self, species: &str) -> Option<&SourceKey> {
        self.sources(species).into_iter().next()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedLeaf {
    pub path: String,
    pub reason: String,
}

impl SkippedLeaf {
    pub fn to_error(&self) -> DashError {
        DashError::CatalogueParse {
            path: self.path.clone(),
            reason: self.reason.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LeafOutcome {
    Indexed { key: SourceKey, entry: CatalogueEntry },
    Skipped(SkippedLeaf),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteMarker {
    pub key: SourceKey,
    pub latitude: f64,
    pub longitude: f64,
    pub long_name: Option<String>,
    pub inlet_height: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CatalogueIndex {
    meta_store: HashMap<SourceKey, SourceMetadata>,
    filename_lookup: HashMap<SourceKey, String>,
    site_structure: SiteStructure,
    order: Vec<SourceKey>,
    skipped: Vec<SkippedLeaf>,
}

impl CatalogueIndex {
    pub fn meta_store(&self) -> &HashMap<SourceKey, SourceMetadata> {
        &self.meta_store
    }

    pub fn filename_lookup(&self) -> &HashMap<SourceKey, String> {
        &self.filename_lookup
    }

    pub fn site_structure(&self) -> &SiteStructure {
        &self.site_structure
    }

    pub fn order(&self) -> &[SourceKey] {
        &self.order
    }

    pub fn skipped(&self) -> &[SkippedLeaf] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &SourceKey) -> bool {
        self.filename_lookup.contains_key(key)
    }

    pub fn metadata(&self, key: &SourceKey) -> Option<&SourceMetadata> {
        self.meta_store.get(key)
    }

    pub fn filepath(&self, key: &SourceKey) -> Option<&str> {
        self.filename_lookup.get(key).map(String::as_str)
    }

    pub fn default_species(&self) -> Option<&str> {
        self.order.first().map(SourceKey::species)
    }

    pub fn default_source_key(&self) -> Option<&SourceKey> {
        self.order.first()
    }

    pub fn data_store(&self) -> DataStore {
        DataStore::seeded(self.order.iter().cloned())
    }

    pub fn site_markers(&self, species: &str) -> Vec<SiteMarker> {
        let mut markers = Vec::new();
        for key in self.site_structure.sources(species) {
            let Some(metadata) = self.meta_store.get(key) else {
                continue;
            };
            match (metadata.latitude(), metadata.longitude()) {
                (Some(latitude), Some(longitude)) => markers.push(SiteMarker {
                    key: key.clone(),
                    latitude,
                    longitude,
                    long_name: metadata.long_name().map(str::to_string),
                    inlet_height: metadata.inlet_height(),
                }),
                _ => debug!(key = %key, "source has no coordinates; no map marker"),
            }
        }
        markers
    }

    fn record(&mut self, key: SourceKey, entry: CatalogueEntry) {
        self.meta_store.insert(key.clone(), entry.metadata);
        self.filename_lookup.insert(key.clone(), entry.filepath);
        self.site_structure.insert(key.clone());
        self.order.push(key);
    }
}

/// Walks `metadata[species][network][site][inlet][instrument]` depth-first in
/// document order. Malformed leaves are skipped and reported; only a root that
/// is not an object fails the whole document.
pub fn index_catalogue(document: &Value) -> Result<CatalogueIndex, DashError> {
    let root = document.as_object().ok_or_else(|| {
        DashError::CatalogueLoad("catalogue root is not a JSON object".to_string())
    })?;

    let mut index = CatalogueIndex::default();
    let mut path = Vec::with_capacity(LEVELS.len());
    for (species, subtree) in root {
        path.push(species.as_str());
        walk(subtree, &mut path, &mut index);
        path.pop();
    }

    if !index.skipped.is_empty() {
        warn!(
            indexed = index.order.len(),
            skipped = index.skipped.len(),
            "catalogue indexed with skipped entries"
        );
    }
    Ok(index)
}

fn walk<'a>(node: &'a Value, path: &mut Vec<&'a str>, index: &mut CatalogueIndex) {
    if path.len() == LEVELS.len() {
        match index_leaf(node, path) {
            LeafOutcome::Indexed { key, entry } => index.record(key, entry),
            LeafOutcome::Skipped(skipped) => skip(index, skipped),
        }
        return;
    }

    let Some(children) = node.as_object() else {
        let level = LEVELS[path.len()];
        skip(
            index,
            SkippedLeaf {
                path: path.join("/"),
                reason: format!("expected an object of {level} entries"),
            },
        );
        return;
    };
    for (name, child) in children {
        path.push(name.as_str());
        walk(child, path, index);
        path.pop();
    }
}

pub fn index_leaf(node: &Value, path: &[&str]) -> LeafOutcome {
    let skipped = |reason: String| {
        LeafOutcome::Skipped(SkippedLeaf {
            path: path.join("/"),
            reason,
        })
    };

    let [species, network, site, inlet, instrument] = path else {
        return skipped(format!("expected {} path components", LEVELS.len()));
    };
    let parts = SourceParts::new(*species, *network, *site, *inlet, *instrument);
    let key = match SourceKey::encode(&parts) {
        Ok(key) => key,
        Err(err) => return skipped(err.to_string()),
    };
    match CatalogueEntry::from_value(node) {
        Ok(entry) => LeafOutcome::Indexed { key, entry },
        Err(reason) => skipped(reason),
    }
}

fn skip(index: &mut CatalogueIndex, skipped: SkippedLeaf) {
    warn!(error = %skipped.to_error(), "skipping catalogue entry");
    index.skipped.push(skipped);
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn metadata_accessors() {
        let metadata = SourceMetadata::new(
            json!({
                "latitude": "51.5",
                "longitude": -0.1,
                "long_name": "tacolneston",
                "magl": "NA",
                "inlet": "185m",
                "units": "ppm"
            })
            .as_object()
            .cloned()
            .unwrap(),
        );
        assert_eq!(metadata.latitude(), Some(51.5));
        assert_eq!(metadata.longitude(), Some(-0.1));
        assert_eq!(metadata.inlet_height().as_deref(), Some("185m"));
        assert_eq!(metadata.units(), Some("ppm"));
    }

    #[test]
    fn entry_accepts_filename_alias() {
        let entry = CatalogueEntry::from_value(&json!({
            "filename": "data/co2.json",
            "metadata": {}
        }))
        .unwrap();
        assert_eq!(entry.filepath, "data/co2.json");
    }

    #[test]
    fn site_structure_keeps_insertion_order() {
        let mut tree = SiteStructure::default();
        for site in ["TAC", "BSD", "RGL"] {
            let key = SourceKey::encode(&SourceParts::new("ch4", "DECC", site, "100m", "picarro"))
                .unwrap();
            tree.insert(key);
        }
        let sites = tree
            .sources("ch4")
            .into_iter()
            .map(|key| key.parts().site.clone())
            .collect::<Vec<_>>();
        assert_eq!(sites, vec!["TAC", "BSD", "RGL"]);
        assert!(tree.sources("n2o").is_empty());
    }

    #[test]
    fn wide_levels_keep_order_and_lookup() {
        let mut tree = SiteStructure::default();
        let keys = (0..500)
            .map(|site| {
                SourceKey::encode(&SourceParts::new("co2", "NET", format!("S{site}"), "10m", "x"))
                    .unwrap()
            })
            .collect::<Vec<_>>();
        for key in &keys {
            tree.insert(key.clone());
        }
        tree.insert(keys[0].clone());

        assert_eq!(tree.sources("co2"), keys.iter().collect::<Vec<_>>());
        assert!(keys.iter().all(|key| tree.contains(key)));
        assert_eq!(tree.networks("co2").unwrap().first().unwrap().1.len(), 500);
    }
}
