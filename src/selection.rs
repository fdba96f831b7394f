use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalogue::SiteStructure;
use crate::domain::SourceKey;
use crate::error::DashError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub added: Vec<SourceKey>,
    pub removed: Vec<SourceKey>,
    pub rejected: Vec<SourceKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Carried(Vec<SourceKey>),
    Fallback(SourceKey),
    Empty,
}

impl Reconciliation {
    pub fn keys(&self) -> Vec<SourceKey> {
        match self {
            Reconciliation::Carried(keys) => keys.clone(),
            Reconciliation::Fallback(key) => vec![key.clone()],
            Reconciliation::Empty => Vec::new(),
        }
    }
}

/// Active species plus the selected sources, kept in selection order.
///
/// Every selected key belongs to the active species.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    species: Option<String>,
    sources: Vec<SourceKey>,
}

impl Selection {
    pub fn new(species: Option<String>, initial: Option<SourceKey>) -> Self {
        let sources = match (&species, initial) {
            (Some(species), Some(key)) if key.species() == species => vec![key],
            _ => Vec::new(),
        };
        Self { species, sources }
    }

    pub fn species(&self) -> Option<&str> {
        self.species.as_deref()
    }

    pub fn sources(&self) -> &[SourceKey] {
        &self.sources
    }

    pub fn contains(&self, key: &SourceKey) -> bool {
        self.sources.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn toggle<'a>(
        &mut self,
        keys: impl IntoIterator<Item = &'a SourceKey>,
        structure: &SiteStructure,
    ) -> ToggleOutcome {
        let mut outcome = ToggleOutcome::default();
        let mut seen: Vec<&SourceKey> = Vec::new();

        for key in keys {
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);

            if !structure.contains(key) {
                warn!(error = %DashError::UnknownSourceKey(key.to_string()), "ignoring toggle");
                outcome.rejected.push(key.clone());
                continue;
            }
            if self.species.as_deref() != Some(key.species()) {
                warn!(
                    key = %key,
                    active = self.species.as_deref().unwrap_or("<none>"),
                    "ignoring toggle of a source outside the active species"
                );
                outcome.rejected.push(key.clone());
                continue;
            }

            if let Some(position) = self.sources.iter().position(|selected| selected == key) {
                self.sources.remove(position);
                outcome.removed.push(key.clone());
            } else {
                self.sources.push(key.clone());
                outcome.added.push(key.clone());
            }
        }

        debug!(
            added = outcome.added.len(),
            removed = outcome.removed.len(),
            rejected = outcome.rejected.len(),
            "selection toggled"
        );
        outcome
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }

    pub fn change_species(&mut self, species: &str, structure: &SiteStructure) -> Reconciliation {
        let mut carried: Vec<SourceKey> = Vec::new();
        for key in &self.sources {
            let candidate = match key.with_species(species) {
                Ok(candidate) => candidate,
                Err(err) => {
                    warn!(key = %key, error = %err, "cannot map selection to new species");
                    continue;
                }
            };
            if structure.contains(&candidate) && !carried.contains(&candidate) {
                carried.push(candidate);
            }
        }

        let reconciliation = if !carried.is_empty() {
            Reconciliation::Carried(carried)
        } else if let Some(first) = structure.first_source(species) {
            Reconciliation::Fallback(first.clone())
        } else {
            Reconciliation::Empty
        };

        match &reconciliation {
            Reconciliation::Carried(keys) => {
                info!(species, carried = keys.len(), "species changed; selection carried over")
            }
            Reconciliation::Fallback(key) => {
                info!(species, key = %key, "species changed; falling back to first source")
            }
            Reconciliation::Empty => warn!(species, "species changed; no sources for species"),
        }

        *self = Self {
            species: Some(species.to_string()),
            sources: reconciliation.keys(),
        };
        reconciliation
    }
}
