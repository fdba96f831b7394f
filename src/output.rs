use std::io::{self, Write};

use serde::Serialize;

use crate::catalogue::{CatalogueIndex, SiteMarker, SkippedLeaf};
use crate::dashboard::{DashboardSnapshot, SeriesState, ViewState};
use crate::domain::SourceKey;
use crate::labels::SpeciesLabels;

#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub sources: usize,
    pub species: Vec<SpeciesSummary>,
    pub default_source: Option<SourceKey>,
    pub skipped: Vec<SkippedLeaf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeciesSummary {
    pub species: String,
    pub label: String,
    pub sources: Vec<SourceKey>,
}

impl IndexSummary {
    pub fn new(catalogue: &CatalogueIndex, labels: &SpeciesLabels) -> Self {
        let structure = catalogue.site_structure();
        let species = structure
            .species()
            .map(|species| SpeciesSummary {
                species: species.to_string(),
                label: labels.label(species),
                sources: structure.sources(species).into_iter().cloned().collect(),
            })
            .collect();
        Self {
            sources: catalogue.len(),
            species,
            default_source: catalogue.default_source_key().cloned(),
            skipped: catalogue.skipped().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub species: Option<String>,
    pub label: Option<String>,
    pub view: ViewState,
    pub units: Option<String>,
    pub sources: Vec<SourceSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub key: SourceKey,
    pub name: Option<String>,
    pub status: &'static str,
    pub points: usize,
    pub first: Option<String>,
    pub last: Option<String>,
}

impl From<&DashboardSnapshot> for SnapshotSummary {
    fn from(snapshot: &DashboardSnapshot) -> Self {
        let sources = snapshot
            .sources
            .iter()
            .map(|view| {
                let name = view
                    .metadata
                    .long_name()
                    .or_else(|| view.metadata.station())
                    .map(str::to_string);
                match &view.series {
                    SeriesState::Ready(series) => {
                        let range = series.time_range();
                        SourceSummary {
                            key: view.key.clone(),
                            name,
                            status: "ready",
                            points: series.len(),
                            first: range.map(|(first, _)| first.to_rfc3339()),
                            last: range.map(|(_, last)| last.to_rfc3339()),
                        }
                    }
                    SeriesState::Pending => SourceSummary {
                        key: view.key.clone(),
                        name,
                        status: "pending",
                        points: 0,
                        first: None,
                        last: None,
                    },
                }
            })
            .collect();

        Self {
            species: snapshot.selected_species.clone(),
            label: snapshot.species_label.clone(),
            view: snapshot.view,
            units: snapshot.units.clone(),
            sources,
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_index(summary: &IndexSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_snapshot(summary: &SnapshotSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_markers(markers: &[SiteMarker]) -> io::Result<()> {
        Self::print_json(&markers)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
