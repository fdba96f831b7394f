mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;

use ghg_dashboard::catalogue::index_catalogue;
use ghg_dashboard::dashboard::{Dashboard, DashboardOptions};
use ghg_dashboard::defaults::{DefaultPolicy, explicit_defaults, resolve_defaults};
use ghg_dashboard::error::DashError;

use common::{BASE_URL, payload_url, sample_catalogue, sample_remote};

fn defaults_document(species: &str, site: &str) -> serde_json::Value {
    json!({
        "species": species,
        "network": "DECC",
        "site": site,
        "inlet": "185m",
        "instrument": "picarro"
    })
}

#[test]
fn explicit_defaults_are_used_when_valid() {
    let catalogue = index_catalogue(&sample_catalogue()).unwrap();
    let document = defaults_document("ch4", "TAC");

    let resolved = resolve_defaults(
        &catalogue,
        DefaultPolicy::ExplicitDefaults,
        Some(&document),
    )
    .unwrap();
    assert_eq!(resolved.policy, DefaultPolicy::ExplicitDefaults);
    assert_eq!(resolved.species, "ch4");
    assert_eq!(resolved.source_key.as_str(), "ch4.DECC_TAC_185m_picarro");
}

#[test]
fn traversal_policy_ignores_document() {
    let catalogue = index_catalogue(&sample_catalogue()).unwrap();
    let document = defaults_document("ch4", "TAC");

    let resolved =
        resolve_defaults(&catalogue, DefaultPolicy::TraversalOrder, Some(&document)).unwrap();
    assert_eq!(resolved.policy, DefaultPolicy::TraversalOrder);
    assert_eq!(resolved.source_key.as_str(), "co2.DECC_TAC_185m_picarro");
}

#[test]
fn unusable_documents_fall_back_to_traversal_order() {
    let catalogue = index_catalogue(&sample_catalogue()).unwrap();
    let documents = [
        defaults_document("ch4", "BSD"),
        json!({ "species": "co2" }),
        json!("co2"),
    ];

    for document in &documents {
        let resolved =
            resolve_defaults(&catalogue, DefaultPolicy::ExplicitDefaults, Some(document))
                .unwrap();
        assert_eq!(resolved.policy, DefaultPolicy::TraversalOrder);
        assert_eq!(resolved.source_key.as_str(), "co2.DECC_TAC_185m_picarro");
    }

    let resolved = resolve_defaults(&catalogue, DefaultPolicy::ExplicitDefaults, None).unwrap();
    assert_eq!(resolved.policy, DefaultPolicy::TraversalOrder);
}

#[test]
fn explicit_defaults_report_missing_source() {
    let catalogue = index_catalogue(&sample_catalogue()).unwrap();
    assert_matches!(
        explicit_defaults(&catalogue, &defaults_document("n2o", "TAC")),
        Err(DashError::DefaultsConfig(_))
    );
}

#[test]
fn dashboard_opens_on_explicit_default() {
    let remote = Arc::new(sample_remote());
    let mut options = DashboardOptions::new(BASE_URL);
    options.default_policy = DefaultPolicy::ExplicitDefaults;
    options.defaults_document = Some(defaults_document("ch4", "TAC"));

    let dashboard = Dashboard::open(
        index_catalogue(&sample_catalogue()).unwrap(),
        Arc::clone(&remote),
        options,
    );
    assert_eq!(dashboard.selected_species(), Some("ch4"));
    assert_eq!(remote.calls(), vec![payload_url("ch4/tac.json")]);
}
