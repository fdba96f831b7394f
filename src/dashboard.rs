use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::cache::{DataState, DataStore, EnsureOutcome, RetrievalCache};
use crate::catalogue::{CatalogueIndex, SiteMarker, SourceMetadata, index_catalogue};
use crate::config::ResolvedConfig;
use crate::defaults::{DefaultPolicy, ResolvedDefaults, resolve_defaults};
use crate::domain::SourceKey;
use crate::error::DashError;
use crate::labels::SpeciesLabels;
use crate::remote::RemoteClient;
use crate::selection::{Reconciliation, Selection, ToggleOutcome};
use crate::series::PlotSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    #[default]
    Inline,
    Background,
}

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub repository_base_url: String,
    pub default_policy: DefaultPolicy,
    pub defaults_document: Option<Value>,
    pub labels: SpeciesLabels,
    pub fetch_mode: FetchMode,
}

impl DashboardOptions {
    pub fn new(repository_base_url: impl Into<String>) -> Self {
        Self {
            repository_base_url: repository_base_url.into(),
            default_policy: DefaultPolicy::TraversalOrder,
            defaults_document: None,
            labels: SpeciesLabels::default(),
            fetch_mode: FetchMode::Inline,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    Sources,
    NoSourceSelected,
    NoDataForSpecies,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesState {
    Pending,
    Ready(Arc<PlotSeries>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceView {
    pub key: SourceKey,
    pub metadata: SourceMetadata,
    pub series: SeriesState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub selected_species: Option<String>,
    pub species_label: Option<String>,
    pub view: ViewState,
    pub sources: Vec<SourceView>,
    pub units: Option<String>,
}

pub struct Dashboard<C: RemoteClient + 'static> {
    catalogue: Arc<CatalogueIndex>,
    cache: Arc<RetrievalCache<C>>,
    selection: Selection,
    defaults: Option<ResolvedDefaults>,
    labels: SpeciesLabels,
    fetch_mode: FetchMode,
    background: Vec<(SourceKey, JoinHandle<EnsureOutcome>)>,
    finished: Vec<EnsureOutcome>,
}

impl<C: RemoteClient + 'static> Dashboard<C> {
    pub fn open(catalogue: CatalogueIndex, client: C, options: DashboardOptions) -> Self {
        let defaults = resolve_defaults(
            &catalogue,
            options.default_policy,
            options.defaults_document.as_ref(),
        );
        let cache = Arc::new(RetrievalCache::new(
            client,
            options.repository_base_url,
            &catalogue,
        ));
        let selection = match &defaults {
            Some(defaults) => Selection::new(
                Some(defaults.species.clone()),
                Some(defaults.source_key.clone()),
            ),
            None => {
                warn!("catalogue has no sources; nothing to select");
                Selection::default()
            }
        };

        let mut dashboard = Self {
            catalogue: Arc::new(catalogue),
            cache,
            selection,
            defaults,
            labels: options.labels,
            fetch_mode: options.fetch_mode,
            background: Vec::new(),
            finished: Vec::new(),
        };
        let initial = dashboard.selection.sources().to_vec();
        dashboard.dispatch(&initial);
        dashboard
    }

    pub fn load(config: &ResolvedConfig, client: C) -> Result<Self, DashError> {
        let catalogue = load_catalogue(config, &client)?;
        let options = DashboardOptions {
            repository_base_url: config.repository_base_url.clone(),
            default_policy: config.default_policy,
            defaults_document: load_defaults_document(config, &client),
            labels: load_labels(config, &client),
            fetch_mode: config.fetch_mode,
        };
        Ok(Self::open(catalogue, client, options))
    }

    pub fn toggle<'a>(&mut self, keys: impl IntoIterator<Item = &'a SourceKey>) -> ToggleOutcome {
        let outcome = self
            .selection
            .toggle(keys, self.catalogue.site_structure());
        self.dispatch(&outcome.added);
        outcome
    }

    pub fn toggle_one(&mut self, key: &SourceKey) -> ToggleOutcome {
        self.toggle(std::iter::once(key))
    }

    pub fn clear(&mut self) {
        self.selection.clear();
        debug!("selection cleared");
    }

    pub fn change_species(&mut self, species: &str) -> Reconciliation {
        let reconciliation = self
            .selection
            .change_species(species, self.catalogue.site_structure());
        self.dispatch(&reconciliation.keys());
        reconciliation
    }

    /// Joins every background fetch and returns the outcomes gathered since
    /// the last call, including fetches that were reaped while dispatching.
    pub fn settle(&mut self) -> Vec<EnsureOutcome> {
        let mut outcomes = std::mem::take(&mut self.finished);
        outcomes.extend(
            self.background
                .drain(..)
                .filter_map(|(key, handle)| join_fetch(&key, handle)),
        );
        outcomes
    }

    pub fn catalogue(&self) -> &Arc<CatalogueIndex> {
        &self.catalogue
    }

    pub fn cache(&self) -> &RetrievalCache<C> {
        &self.cache
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_species(&self) -> Option<&str> {
        self.selection.species()
    }

    pub fn selected_sources(&self) -> &[SourceKey] {
        self.selection.sources()
    }

    pub fn defaults(&self) -> Option<&ResolvedDefaults> {
        self.defaults.as_ref()
    }

    pub fn labels(&self) -> &SpeciesLabels {
        &self.labels
    }

    pub fn species(&self) -> Vec<&str> {
        self.catalogue.site_structure().species().collect()
    }

    pub fn data_state(&self, key: &SourceKey) -> DataState {
        self.cache.state(key)
    }

    pub fn data_store(&self) -> DataStore {
        self.cache.snapshot()
    }

    pub fn site_markers(&self) -> Vec<SiteMarker> {
        match self.selection.species() {
            Some(species) => self.catalogue.site_markers(species),
            None => Vec::new(),
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let species = self.selection.species();
        let has_sources = species
            .map(|species| self.catalogue.site_structure().first_source(species).is_some())
            .unwrap_or(false);

        let sources = self
            .selection
            .sources()
            .iter()
            .map(|key| SourceView {
                key: key.clone(),
                metadata: self.catalogue.metadata(key).cloned().unwrap_or_default(),
                series: match self.cache.state(key) {
                    DataState::Ready(series) => SeriesState::Ready(series),
                    DataState::Pending | DataState::Unknown => SeriesState::Pending,
                },
            })
            .collect::<Vec<_>>();

        let view = if !has_sources {
            ViewState::NoDataForSpecies
        } else if sources.is_empty() {
            ViewState::NoSourceSelected
        } else {
            ViewState::Sources
        };

        DashboardSnapshot {
            selected_species: species.map(str::to_string),
            species_label: species.map(|species| self.labels.label(species)),
            view,
            units: common_units(&sources),
            sources,
        }
    }

    fn dispatch(&mut self, keys: &[SourceKey]) {
        match self.fetch_mode {
            FetchMode::Inline => {
                for key in keys {
                    self.cache.ensure(key);
                }
            }
            FetchMode::Background => {
                self.reap_finished();
                for key in keys {
                    if matches!(self.cache.state(key), DataState::Ready(_)) {
                        continue;
                    }
                    if self.background.iter().any(|(running, _)| running == key) {
                        debug!(key = %key, "background fetch already running");
                        continue;
                    }
                    let cache = Arc::clone(&self.cache);
                    let fetch_key = key.clone();
                    let handle = thread::spawn(move || cache.ensure(&fetch_key));
                    self.background.push((key.clone(), handle));
                }
            }
        }
    }

    fn reap_finished(&mut self) {
        let (done, running): (Vec<_>, Vec<_>) = self
            .background
            .drain(..)
            .partition(|(_, handle)| handle.is_finished());
        self.background = running;
        self.finished.extend(
            done.into_iter()
                .filter_map(|(key, handle)| join_fetch(&key, handle)),
        );
    }
}

fn join_fetch(key: &SourceKey, handle: JoinHandle<EnsureOutcome>) -> Option<EnsureOutcome> {
    match handle.join() {
        Ok(outcome) => Some(outcome),
        Err(_) => {
            error!(key = %key, "background fetch panicked");
            None
        }
    }
}

pub fn load_catalogue(
    config: &ResolvedConfig,
    client: &dyn RemoteClient,
) -> Result<CatalogueIndex, DashError> {
    let document = config
        .catalogue
        .load_json(client)
        .map_err(|err| DashError::CatalogueLoad(format!("{}: {err}", config.catalogue)))?;
    let catalogue = index_catalogue(&document)?;
    info!(
        location = %config.catalogue,
        sources = catalogue.len(),
        skipped = catalogue.skipped().len(),
        "catalogue loaded"
    );
    Ok(catalogue)
}

pub fn load_defaults_document(config: &ResolvedConfig, client: &dyn RemoteClient) -> Option<Value> {
    let location = config.defaults.as_ref()?;
    location
        .load_json(client)
        .map_err(|err| {
            let err = DashError::DefaultsConfig(format!("{location}: {err}"));
            warn!(error = %err, "defaults document unavailable");
        })
        .ok()
}

pub fn load_labels(config: &ResolvedConfig, client: &dyn RemoteClient) -> SpeciesLabels {
    let Some(location) = &config.species_labels else {
        return SpeciesLabels::default();
    };
    location
        .load_json(client)
        .and_then(|value| SpeciesLabels::from_value(&value))
        .unwrap_or_else(|err| {
            warn!(location = %location, error = %err, "species labels unavailable");
            SpeciesLabels::default()
        })
}

/// A source without units counts as its own unit, so it makes the selection mixed.
pub fn common_units(sources: &[SourceView]) -> Option<String> {
    let mut units: Vec<Option<&str>> = Vec::new();
    for view in sources {
        let unit = view.metadata.units();
        if unit.is_none() {
            debug!(key = %view.key, "source metadata has no units");
        }
        if !units.contains(&unit) {
            units.push(unit);
        }
    }
    match units.as_slice() {
        [unit] => unit.map(str::to_string),
        [] => None,
        mixed => {
            warn!(units = ?mixed, "selected sources report different units");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::domain::SourceParts;

    #[derive(Default)]
    struct SlowRemote {
        calls: Mutex<usize>,
    }

    impl RemoteClient for SlowRemote {
        fn get_json(&self, _url: &str) -> Result<Value, DashError> {
            *self.calls.lock().unwrap() += 1;
            thread::sleep(Duration::from_millis(50));
            Ok(json!({ "1577836800000": 410.0 }))
        }
    }

    fn view(site: &str, units: Option<&str>) -> SourceView {
        let mut metadata = serde_json::Map::new();
        if let Some(units) = units {
            metadata.insert("units".to_string(), json!(units));
        }
        SourceView {
            key: SourceKey::encode(&SourceParts::new("co2", "NET", site, "10m", "picarro"))
                .unwrap(),
            metadata: SourceMetadata::new(metadata),
            series: SeriesState::Pending,
        }
    }

    #[test]
    fn units_shared() {
        let views = [view("A", Some("ppm")), view("B", Some("ppm"))];
        assert_eq!(common_units(&views).as_deref(), Some("ppm"));
    }

    #[test]
    fn units_missing_on_one_source() {
        let views = [view("A", Some("ppm")), view("B", None)];
        assert_eq!(common_units(&views), None);
        assert_eq!(common_units(&[view("C", None)]), None);
    }

    #[test]
    fn units_mixed() {
        let views = [view("A", Some("ppm")), view("B", Some("ppb"))];
        assert_eq!(common_units(&views), None);
    }

    #[test]
    fn background_mode_spawns_one_fetch_per_key() {
        let catalogue = index_catalogue(&json!({
            "co2": { "N": {
                "A": { "1m": { "i": { "filepath": "a.json", "metadata": {} } } },
                "B": { "1m": { "i": { "filepath": "b.json", "metadata": {} } } }
            }}
        }))
        .unwrap();
        let remote = Arc::new(SlowRemote::default());
        let mut options = DashboardOptions::new("https://data.example.org");
        options.fetch_mode = FetchMode::Background;
        let mut dashboard = Dashboard::open(catalogue, Arc::clone(&remote), options);

        let b: SourceKey = "co2.N_B_1m_i".parse().unwrap();
        for _ in 0..1000 {
            dashboard.toggle_one(&b);
        }
        assert!(dashboard.background.len() <= 2);

        let outcomes = dashboard.settle();
        assert_eq!(outcomes, vec![EnsureOutcome::Fetched, EnsureOutcome::Fetched]);
        assert_eq!(*remote.calls.lock().unwrap(), 2);
        assert!(dashboard.background.is_empty());

        for _ in 0..10 {
            dashboard.toggle_one(&b);
        }
        assert!(dashboard.background.is_empty());
        assert!(dashboard.settle().is_empty());
    }
}
