use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::PlanetError;

pub const GEOFABRIK_INDEX_URL: &str = "https://download.geofabrik.de/index-v1-nogeom.json";

const EXTRACT_SUFFIX: &str = "-latest.osm.pbf";
const UPDATES_SUFFIX: &str = "-updates";
const MAX_SUGGESTIONS: usize = 5;

/// Parent ids the catalog references without their regional prefix.
const PARENT_ID_EXCEPTIONS: &[(&str, &str)] = &[
    ("us", "north-america/us"),
    ("canada", "north-america/canada"),
];

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: FeatureProperties,
}

#[derive(Debug, Deserialize)]
struct FeatureProperties {
    id: String,
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    urls: CatalogUrls,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogUrls {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl Default for CatalogUrls {
    fn default() -> Self {
        CatalogUrls::List(Vec::new())
    }
}

impl CatalogUrls {
    fn extract_url(&self, id: &str) -> Result<String, PlanetError> {
        let matching = self
            .values()
            .filter(|url| url.ends_with(EXTRACT_SUFFIX))
            .collect::<Vec<_>>();
        match matching.as_slice() {
            [url] => Ok((*url).clone()),
            [] => Err(PlanetError::Data(format!(
                "{id} has no url ending in {EXTRACT_SUFFIX}"
            ))),
            many => Err(PlanetError::Data(format!(
                "{id} has {} urls ending in {EXTRACT_SUFFIX}",
                many.len()
            ))),
        }
    }

    fn updates_url(&self) -> Option<String> {
        match self {
            CatalogUrls::Map(map) => map.get("updates").cloned(),
            CatalogUrls::List(list) => list
                .iter()
                .find(|url| url.trim_end_matches('/').ends_with(UPDATES_SUFFIX))
                .cloned(),
        }
    }

    fn values(&self) -> Box<dyn Iterator<Item = &String> + '_> {
        match self {
            CatalogUrls::List(list) => Box::new(list.iter()),
            CatalogUrls::Map(map) => Box::new(map.values()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub url: String,
    pub parent: Option<String>,
    pub updates_url: Option<String>,
    pub full_id: Option<String>,
    pub full_name: Option<String>,
}

impl CatalogEntry {
    pub fn qualified_id(&self) -> &str {
        self.full_id.as_deref().unwrap_or(&self.id)
    }

    pub fn qualified_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.name)
    }

    pub fn checksum_url(&self) -> String {
        format!("{}.md5", self.url)
    }

    pub fn state_url(&self) -> Option<String> {
        self.updates_url
            .as_ref()
            .map(|url| format!("{}/state.txt", url.trim_end_matches('/')))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn from_json(text: &str) -> Result<Self, PlanetError> {
        let document: CatalogDocument =
            serde_json::from_str(text).map_err(|err| PlanetError::Data(err.to_string()))?;
        let mut catalog = Catalog::default();
        for feature in document.features {
            let props = feature.properties;
            let entry = CatalogEntry {
                url: props.urls.extract_url(&props.id)?,
                updates_url: props.urls.updates_url(),
                id: props.id,
                name: props.name,
                parent: props.parent,
                full_id: None,
                full_name: None,
            };
            catalog.insert(entry)?;
        }
        catalog.resolve()?;
        Ok(catalog)
    }

    pub fn insert(&mut self, entry: CatalogEntry) -> Result<(), PlanetError> {
        if self.entries.contains_key(&entry.id) {
            return Err(PlanetError::Data(format!("duplicate id {}", entry.id)));
        }
        self.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    pub fn resolve(&mut self) -> Result<(), PlanetError> {
        let mut unresolved = self
            .entries
            .values()
            .filter(|entry| entry.full_id.is_none())
            .map(|entry| entry.id.clone())
            .collect::<BTreeSet<_>>();

        while !unresolved.is_empty() {
            let mut progress = Vec::new();
            for id in &unresolved {
                let entry = &self.entries[id];
                let qualified = match entry.parent.as_deref() {
                    None => Some((entry.id.clone(), entry.name.clone())),
                    Some(parent) => self.lookup_parent(parent).and_then(|parent| {
                        Some((
                            format!("{}/{}", parent.full_id.as_ref()?, leaf_id(&entry.id)),
                            format!("{} / {}", parent.full_name.as_ref()?, entry.name),
                        ))
                    }),
                };
                if let Some(qualified) = qualified {
                    progress.push((id.clone(), qualified));
                }
            }

            if progress.is_empty() {
                let stuck = unresolved.iter().map(String::as_str).collect::<Vec<_>>();
                return Err(PlanetError::Data(format!(
                    "unable to resolve parents of: {}",
                    stuck.join(", ")
                )));
            }

            for (id, (full_id, full_name)) in progress {
                unresolved.remove(&id);
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.full_id = Some(full_id);
                    entry.full_name = Some(full_name);
                }
            }
        }
        Ok(())
    }

    fn lookup_parent(&self, parent: &str) -> Option<&CatalogEntry> {
        self.entries.get(parent).or_else(|| {
            PARENT_ID_EXCEPTIONS
                .iter()
                .find(|(short, _)| *short == parent)
                .and_then(|(_, full)| self.entries.get(*full))
        })
    }

    pub fn find(&self, query: &str) -> Result<&CatalogEntry, PlanetError> {
        let query = query.trim();
        if let Some(entry) = self.entries.get(query) {
            return Ok(entry);
        }

        let needle = query.to_lowercase();
        let matches = self
            .entries
            .values()
            .filter(|entry| {
                entry.id.to_lowercase() == needle
                    || entry.qualified_id().to_lowercase() == needle
                    || entry.name.to_lowercase() == needle
            })
            .collect::<Vec<_>>();

        match matches.as_slice() {
            [entry] => Ok(*entry),
            [] => Err(PlanetError::AreaNotFound {
                query: query.to_string(),
                suggestions: self.suggest(&needle),
            }),
            many => {
                let ids = many
                    .iter()
                    .map(|entry| entry.qualified_id())
                    .collect::<Vec<_>>();
                Err(PlanetError::Data(format!(
                    "{query} is ambiguous, use one of: {}",
                    ids.join(", ")
                )))
            }
        }
    }

    pub fn search(&self, filter: Option<&str>) -> Vec<&CatalogEntry> {
        let needle = filter.map(|value| value.trim().to_lowercase());
        let mut found = self
            .entries
            .values()
            .filter(|entry| match &needle {
                Some(needle) => matches_loosely(entry, needle),
                None => true,
            })
            .collect::<Vec<_>>();
        found.sort_by(|a, b| a.qualified_id().cmp(b.qualified_id()));
        found
    }

    fn suggest(&self, needle: &str) -> String {
        let close = self
            .search(Some(needle))
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .map(|entry| entry.qualified_id())
            .collect::<Vec<_>>();
        if close.is_empty() {
            "run `planet-dl list` to see all areas".to_string()
        } else {
            format!("did you mean: {}", close.join(", "))
        }
    }
}

fn matches_loosely(entry: &CatalogEntry, needle: &str) -> bool {
    entry.qualified_id().to_lowercase().contains(needle)
        || entry.qualified_name().to_lowercase().contains(needle)
}

fn leaf_id(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}
