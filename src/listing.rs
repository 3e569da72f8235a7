use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};

use crate::domain::{MirrorId, Source};
use crate::error::PlanetError;

static PLANET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^planet-(\d{6}|latest)\.osm\.pbf(\.md5)?$").expect("valid planet name regex")
});
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

const LATEST: &str = "latest";
const DATED_REVISIONS_KEPT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListingEntry {
    pub name: String,
    pub href: String,
}

impl ListingEntry {
    pub fn new(name: &str, href: &str) -> Self {
        Self {
            name: name.to_string(),
            href: href.to_string(),
        }
    }
}

pub fn extract_anchors(html: &str) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?.trim();
            let name = anchor.text().collect::<String>().trim().to_string();
            Some(ListingEntry {
                name,
                href: href.to_string(),
            })
        })
        .collect()
}

pub fn parse_listing(base_url: &str, mirror: MirrorId, mut entries: Vec<ListingEntry>) -> Vec<Source> {
    entries.sort();

    let mut candidates: BTreeMap<String, Source> = BTreeMap::new();
    for entry in &entries {
        let Some(captures) = PLANET_NAME.captures(&entry.name) else {
            tracing::debug!("ignoring unexpected name {:?} from {base_url}", entry.name);
            continue;
        };
        let token = &captures[1];
        let is_checksum = captures.get(2).is_some();
        if let Err(err) = register(&mut candidates, base_url, mirror, entry, token, is_checksum) {
            tracing::warn!("{err}, while parsing {} from {base_url}", entry.name);
        }
    }

    let latest = candidates.remove(LATEST);
    // Tokens are YYMMDD, so lexical order is chronological.
    let mut result: Vec<Source> = candidates
        .into_values()
        .rev()
        .take(DATED_REVISIONS_KEPT)
        .collect();
    if let Some(latest) = latest {
        result.insert(0, latest);
    }
    result
}

fn register(
    candidates: &mut BTreeMap<String, Source>,
    base_url: &str,
    mirror: MirrorId,
    entry: &ListingEntry,
    token: &str,
    is_checksum: bool,
) -> Result<(), PlanetError> {
    let url = resolve_href(base_url, &entry.href)?;
    if is_checksum {
        let source = candidates.get_mut(token).ok_or_else(|| {
            PlanetError::Parse("md5 file exists, but data file does not".to_string())
        })?;
        source.checksum_url = Some(url);
        return Ok(());
    }

    if candidates.contains_key(token) {
        return Err(PlanetError::Parse(format!("{token} already exists")));
    }
    let timestamp = parse_token(token)?;
    candidates.insert(
        token.to_string(),
        Source::new(&entry.name, &url, timestamp, mirror),
    );
    Ok(())
}

fn parse_token(token: &str) -> Result<Option<NaiveDate>, PlanetError> {
    if token == LATEST {
        return Ok(None);
    }
    NaiveDate::parse_from_str(token, "%y%m%d")
        .map(Some)
        .map_err(|err| PlanetError::Parse(format!("invalid date {token}: {err}")))
}

fn resolve_href(base_url: &str, href: &str) -> Result<String, PlanetError> {
    let base = Url::parse(base_url)
        .map_err(|err| PlanetError::Parse(format!("invalid base url {base_url}: {err}")))?;
    base.join(href)
        .map(|url| url.to_string())
        .map_err(|err| PlanetError::Parse(format!("invalid href {href}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://ftp.example.org/pbf/";

    fn entry(name: &str) -> ListingEntry {
        ListingEntry::new(name, name)
    }

    #[test]
    fn anchors_are_trimmed() {
        let html = r#"<html><body><pre>
            <a href="../">../</a>
            <a href=" planet-230101.osm.pbf "> planet-230101.osm.pbf </a>
            <a name="no-href">ignored</a>
        </pre></body></html>"#;
        let anchors = extract_anchors(html);
        assert_eq!(
            anchors,
            vec![
                ListingEntry::new("../", "../"),
                ListingEntry::new("planet-230101.osm.pbf", "planet-230101.osm.pbf"),
            ]
        );
    }

    #[test]
    fn keeps_latest_and_two_newest() {
        let entries = vec![
            entry("planet-230108.osm.pbf"),
            entry("planet-latest.osm.pbf"),
            entry("planet-221225.osm.pbf"),
            entry("planet-230101.osm.pbf"),
            entry("planet-230101.osm.pbf.md5"),
            entry("changesets-230101.osm.bz2"),
        ];
        let sources = parse_listing(BASE, MirrorId(0), entries);
        let names = sources.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "planet-latest.osm.pbf",
                "planet-230108.osm.pbf",
                "planet-230101.osm.pbf"
            ]
        );
        assert_eq!(
            sources[2].checksum_url.as_deref(),
            Some("https://ftp.example.org/pbf/planet-230101.osm.pbf.md5")
        );
        assert_eq!(sources[1].timestamp, NaiveDate::from_ymd_opt(2023, 1, 8));
        assert!(sources[0].is_latest_alias());
    }

    #[test]
    fn orphan_checksum_is_skipped() {
        let entries = vec![
            entry("planet-230101.osm.pbf.md5"),
            entry("planet-230108.osm.pbf"),
        ];
        let sources = parse_listing(BASE, MirrorId(0), entries);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "planet-230108.osm.pbf");
        assert!(sources[0].checksum_url.is_none());
    }

    #[test]
    fn duplicate_date_keeps_first() {
        let entries = vec![
            ListingEntry::new("planet-230101.osm.pbf", "a/planet-230101.osm.pbf"),
            ListingEntry::new("planet-230101.osm.pbf", "b/planet-230101.osm.pbf"),
        ];
        let sources = parse_listing(BASE, MirrorId(0), entries);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, "https://ftp.example.org/pbf/a/planet-230101.osm.pbf");
    }

    #[test]
    fn invalid_calendar_date_is_skipped() {
        let sources = parse_listing(BASE, MirrorId(0), vec![entry("planet-231399.osm.pbf")]);
        assert!(sources.is_empty());
    }

    #[test]
    fn hrefs_resolve_against_base() {
        assert_eq!(
            resolve_href(BASE, "/other/planet-230101.osm.pbf").unwrap(),
            "https://ftp.example.org/other/planet-230101.osm.pbf"
        );
        assert_eq!(
            resolve_href(BASE, "https://cdn.example.net/planet-230101.osm.pbf").unwrap(),
            "https://cdn.example.net/planet-230101.osm.pbf"
        );
    }
}
