mod common;

use assert_matches::assert_matches;
use serde_json::json;

use ghg_dashboard::cache::DataState;
use ghg_dashboard::catalogue::{LeafOutcome, index_catalogue, index_leaf};
use ghg_dashboard::error::DashError;

use common::{leaf, sample_catalogue};

#[test]
fn indexes_every_leaf() {
    let catalogue = index_catalogue(&sample_catalogue()).unwrap();

    assert_eq!(catalogue.len(), 4);
    assert_eq!(catalogue.meta_store().len(), 4);
    assert_eq!(catalogue.filename_lookup().len(), 4);
    assert!(catalogue.skipped().is_empty());

    let data_store = catalogue.data_store();
    assert_eq!(data_store.len(), 4);
    for key in catalogue.order() {
        assert!(catalogue.site_structure().contains(key));
        assert_eq!(data_store.state(key), DataState::Pending);
    }
}

#[test]
fn traversal_order_follows_document() {
    let catalogue = index_catalogue(&sample_catalogue()).unwrap();
    let order = catalogue
        .order()
        .iter()
        .map(|key| key.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        order,
        vec![
            "co2.DECC_TAC_185m_picarro",
            "co2.DECC_BSD_248m_picarro",
            "ch4.DECC_TAC_185m_picarro",
            "n2o.DECC_RGL_90m_medusa",
        ]
    );
    assert_eq!(catalogue.default_species(), Some("co2"));
    assert_eq!(
        catalogue.default_source_key().map(|key| key.as_str()),
        Some("co2.DECC_TAC_185m_picarro")
    );
    let species = catalogue.site_structure().species().collect::<Vec<_>>();
    assert_eq!(species, vec!["co2", "ch4", "n2o"]);
}

#[test]
fn scenario_single_leaf() {
    let document = json!({
        "co2": { "NET1": { "SITEA": { "10m": { "instrA": {
            "filepath": "a.json",
            "metadata": { "units": "ppm" }
        }}}}}
    });
    let catalogue = index_catalogue(&document).unwrap();
    let key = catalogue.default_source_key().unwrap();
    assert_eq!(key.as_str(), "co2.NET1_SITEA_10m_instrA");
    assert_eq!(catalogue.filepath(key), Some("a.json"));
    assert_eq!(catalogue.metadata(key).unwrap().units(), Some("ppm"));
}

#[test]
fn malformed_leaves_are_skipped_and_counted() {
    let document = json!({
        "co2": {
            "DECC": {
                "TAC": {
                    "185m": {
                        "picarro": leaf("co2/tac.json", "ppm", "tacolneston"),
                        "broken": { "metadata": {} },
                        "nometa": { "filepath": "x.json" }
                    }
                },
                "BSD": "not an object"
            }
        },
        "": { "DECC": { "X": { "1m": { "y": leaf("z.json", "ppm", "z") } } } }
    });

    let catalogue = index_catalogue(&document).unwrap();
    assert_eq!(catalogue.len(), 1);
    assert_eq!(catalogue.skipped().len(), 4);

    let paths = catalogue
        .skipped()
        .iter()
        .map(|skipped| skipped.path.as_str())
        .collect::<Vec<_>>();
    assert!(paths.contains(&"co2/DECC/TAC/185m/broken"));
    assert!(paths.contains(&"co2/DECC/TAC/185m/nometa"));
    assert!(paths.contains(&"co2/DECC/BSD"));
}

#[test]
fn root_must_be_an_object() {
    assert_matches!(
        index_catalogue(&json!(["co2"])),
        Err(DashError::CatalogueLoad(_))
    );
}

#[test]
fn empty_document_is_an_empty_catalogue() {
    let catalogue = index_catalogue(&json!({})).unwrap();
    assert!(catalogue.is_empty());
    assert!(catalogue.default_source_key().is_none());
}

#[test]
fn leaf_outcome_is_explicit() {
    let outcome = index_leaf(
        &leaf("a.json", "ppm", "a"),
        &["co2", "NET", "SITE", "10m", "x"],
    );
    assert_matches!(outcome, LeafOutcome::Indexed { ref key, .. } if key.as_str() == "co2.NET_SITE_10m_x");

    let outcome = index_leaf(&json!(42), &["co2", "NET", "SITE", "10m", "x"]);
    assert_matches!(outcome, LeafOutcome::Skipped(ref skipped) if skipped.path == "co2/NET/SITE/10m/x");
}

#[test]
fn site_markers_need_coordinates() {
    let document = json!({
        "co2": { "DECC": {
            "TAC": { "185m": { "picarro": leaf("a.json", "ppm", "tacolneston") } },
            "MHD": { "10m": { "picarro": { "filepath": "b.json", "metadata": { "units": "ppm" } } } }
        }}
    });
    let catalogue = index_catalogue(&document).unwrap();
    let markers = catalogue.site_markers("co2");
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].long_name.as_deref(), Some("tacolneston"));
    assert_eq!(markers[0].inlet_height.as_deref(), Some("185m"));
    assert!(catalogue.site_markers("ch4").is_empty());
}
