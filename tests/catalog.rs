use assert_matches::assert_matches;
use serde_json::json;

use planet_dl::catalog::{Catalog, CatalogEntry};
use planet_dl::error::PlanetError;

fn feature(id: &str, name: &str, parent: Option<&str>) -> serde_json::Value {
    let base = format!("https://download.geofabrik.de/{id}");
    let mut properties = json!({
        "id": id,
        "name": name,
        "urls": {
            "pbf": format!("{base}-latest.osm.pbf"),
            "bz2": format!("{base}-latest.osm.bz2"),
            "updates": format!("{base}-updates"),
        },
    });
    if let Some(parent) = parent {
        properties["parent"] = json!(parent);
    }
    json!({ "type": "Feature", "properties": properties })
}

fn index(features: Vec<serde_json::Value>) -> String {
    json!({ "type": "FeatureCollection", "features": features }).to_string()
}

fn sample() -> Catalog {
    Catalog::from_json(&index(vec![
        feature("europe", "Europe", None),
        feature("monaco", "Monaco", Some("europe")),
        feature("germany", "Germany", Some("europe")),
        feature("bayern", "Bayern", Some("germany")),
        feature("north-america", "North America", None),
        feature("north-america/us", "United States of America", Some("north-america")),
        feature("us/georgia", "Georgia", Some("us")),
        feature("asia", "Asia", None),
        feature("georgia", "Georgia", Some("asia")),
    ]))
    .unwrap()
}

#[test]
fn parent_chain_builds_qualified_id_and_name() {
    let catalog = Catalog::from_json(&index(vec![
        feature("a", "A", Some("b")),
        feature("b", "B", Some("c")),
        feature("c", "C", None),
    ]))
    .unwrap();

    let a = catalog.get("a").unwrap();
    assert_eq!(a.full_id.as_deref(), Some("c/b/a"));
    assert_eq!(a.full_name.as_deref(), Some("C / B / A"));
    let c = catalog.get("c").unwrap();
    assert_eq!(c.qualified_id(), "c");
    assert_eq!(c.qualified_name(), "C");
}

#[test]
fn every_entry_is_resolved() {
    let catalog = sample();
    assert_eq!(catalog.len(), 9);
    assert!(catalog.search(None).iter().all(|entry| entry.full_id.is_some()));
}

#[test]
fn short_parent_id_falls_back_to_regional_id() {
    let catalog = sample();
    let georgia = catalog.get("us/georgia").unwrap();
    assert_eq!(georgia.qualified_id(), "north-america/us/georgia");
    assert_eq!(
        georgia.qualified_name(),
        "North America / United States of America / Georgia"
    );
}

#[test]
fn missing_parent_is_a_data_error() {
    let err = Catalog::from_json(&index(vec![feature("monaco", "Monaco", Some("europe"))]))
        .unwrap_err();
    assert_matches!(err, PlanetError::Data(message) if message.contains("monaco"));
}

#[test]
fn parent_cycle_is_a_data_error() {
    let err = Catalog::from_json(&index(vec![
        feature("root", "Root", None),
        feature("x", "X", Some("y")),
        feature("y", "Y", Some("x")),
    ]))
    .unwrap_err();
    assert_matches!(err, PlanetError::Data(_));
}

#[test]
fn duplicate_id_is_a_data_error() {
    let err = Catalog::from_json(&index(vec![
        feature("monaco", "Monaco", None),
        feature("monaco", "Monaco again", None),
    ]))
    .unwrap_err();
    assert_matches!(err, PlanetError::Data(_));
}

#[test]
fn extract_url_must_be_unique() {
    let none = json!({
        "type": "Feature",
        "properties": {
            "id": "monaco",
            "name": "Monaco",
            "urls": { "bz2": "https://download.geofabrik.de/europe/monaco-latest.osm.bz2" },
        },
    });
    let err = Catalog::from_json(&index(vec![none])).unwrap_err();
    assert_matches!(err, PlanetError::Data(_));

    let two = json!({
        "type": "Feature",
        "properties": {
            "id": "monaco",
            "name": "Monaco",
            "urls": [
                "https://download.geofabrik.de/europe/monaco-latest.osm.pbf",
                "https://mirror.example.org/europe/monaco-latest.osm.pbf",
            ],
        },
    });
    let err = Catalog::from_json(&index(vec![two])).unwrap_err();
    assert_matches!(err, PlanetError::Data(_));
}

#[test]
fn url_list_is_accepted() {
    let listed = json!({
        "type": "Feature",
        "properties": {
            "id": "monaco",
            "name": "Monaco",
            "urls": [
                "https://download.geofabrik.de/europe/monaco-latest.osm.pbf",
                "https://download.geofabrik.de/europe/monaco-updates",
            ],
        },
    });
    let catalog = Catalog::from_json(&index(vec![listed])).unwrap();
    let entry = catalog.get("monaco").unwrap();
    assert_eq!(
        entry.url,
        "https://download.geofabrik.de/europe/monaco-latest.osm.pbf"
    );
    assert_eq!(
        entry.state_url().as_deref(),
        Some("https://download.geofabrik.de/europe/monaco-updates/state.txt")
    );
}

#[test]
fn malformed_json_is_a_data_error() {
    assert_matches!(Catalog::from_json("{\"features\": 3}"), Err(PlanetError::Data(_)));
}

#[test]
fn find_by_exact_id() {
    let catalog = sample();
    let entry = catalog.find("monaco").unwrap();
    assert_eq!(entry.qualified_id(), "europe/monaco");
    assert_eq!(
        entry.url,
        "https://download.geofabrik.de/monaco-latest.osm.pbf"
    );
}

#[test]
fn find_ignores_case_and_accepts_names_and_qualified_ids() {
    let catalog = sample();
    assert_eq!(catalog.find("MONACO").unwrap().id, "monaco");
    assert_eq!(catalog.find("Bayern").unwrap().id, "bayern");
    assert_eq!(catalog.find("europe/germany/bayern").unwrap().id, "bayern");
    assert_eq!(catalog.find("united states of america").unwrap().id, "north-america/us");
}

#[test]
fn ambiguous_name_is_rejected() {
    let catalog = sample();
    let err = catalog.find("Georgia").unwrap_err();
    assert_matches!(err, PlanetError::Data(message) if message.contains("asia/georgia"));
    // the exact id still wins
    assert_eq!(catalog.find("georgia").unwrap().qualified_id(), "asia/georgia");
}

#[test]
fn unknown_area_suggests_close_matches() {
    let catalog = sample();
    let err = catalog.find("germ").unwrap_err();
    assert_matches!(
        err,
        PlanetError::AreaNotFound { query, suggestions }
            if query == "germ" && suggestions.contains("europe/germany")
    );

    let err = catalog.find("atlantis").unwrap_err();
    assert_matches!(
        err,
        PlanetError::AreaNotFound { suggestions, .. } if suggestions.contains("planet-dl list")
    );
}

#[test]
fn search_filters_and_sorts_by_qualified_id() {
    let catalog = sample();
    let found = catalog
        .search(Some("GEORGIA"))
        .into_iter()
        .map(CatalogEntry::qualified_id)
        .collect::<Vec<_>>();
    assert_eq!(found, vec!["asia/georgia", "north-america/us/georgia"]);

    let all = catalog.search(None);
    assert_eq!(all.len(), 9);
    assert_eq!(all[0].qualified_id(), "asia");
}
