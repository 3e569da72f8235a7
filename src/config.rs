use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::domain::Mirror;
use crate::error::PlanetError;
use crate::fetcher::DEFAULT_TIMEOUT;

pub const DEFAULT_CONFIG_FILE: &str = "planet-mirrors.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub mirrors: Option<Vec<MirrorEntry>>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MirrorEntry {
    Shorthand(String),
    Detailed(MirrorEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MirrorEntryObject {
    #[serde(default)]
    pub country: Option<String>,
    pub url: String,
    #[serde(default)]
    pub avoid_by_default: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub timeout: Duration,
    pub mirrors: Vec<Mirror>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, PlanetError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PlanetError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| PlanetError::ConfigParse(err.to_string()))?;
        tracing::debug!("loaded mirror config from {}", config_path.display());

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, PlanetError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let timeout = config
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        let mirrors = match config.mirrors {
            None => default_mirrors(),
            Some(entries) if entries.is_empty() => {
                return Err(PlanetError::InvalidMirror(
                    "mirror list is empty".to_string(),
                ));
            }
            Some(entries) => entries
                .into_iter()
                .map(|entry| match entry {
                    MirrorEntry::Shorthand(url) => {
                        let url = normalize_mirror_url(&url)?;
                        let label = host_label(&url);
                        Ok(Mirror::new(&label, url.as_str()))
                    }
                    MirrorEntry::Detailed(obj) => {
                        let url = normalize_mirror_url(&obj.url)?;
                        let label = obj.country.unwrap_or_else(|| host_label(&url));
                        let mirror = Mirror::new(&label, url.as_str());
                        Ok(if obj.avoid_by_default {
                            mirror.avoided()
                        } else {
                            mirror
                        })
                    }
                })
                .collect::<Result<Vec<_>, PlanetError>>()?,
        };

        Ok(ResolvedConfig {
            schema_version,
            timeout,
            mirrors,
        })
    }
}

pub fn default_mirrors() -> Vec<Mirror> {
    vec![
        Mirror::new("GB", "https://planet.openstreetmap.org/pbf/").avoided(),
        Mirror::new("DE", "https://download.bbbike.org/osm/planet/"),
        Mirror::new("DE", "https://ftp.spline.de/pub/openstreetmap/pbf/"),
        Mirror::new(
            "DE",
            "https://ftp5.gwdg.de/pub/misc/openstreetmap/planet.openstreetmap.org/pbf/",
        ),
        Mirror::new("JP", "https://planet.passportcontrol.net/pbf/"),
        Mirror::new("NL", "https://ftp.nluug.nl/maps/planet.openstreetmap.org/pbf/"),
        Mirror::new("NL", "https://ftp.snt.utwente.nl/pub/misc/openstreetmap/"),
        Mirror::new("TW", "https://free.nchc.org.tw/osm.planet/pbf/"),
        Mirror::new("US", "https://ftp.osuosl.org/pub/openstreetmap/pbf/"),
        Mirror::new("US", "https://ftpmirror.your.org/pub/openstreetmap/pbf/"),
    ]
}

fn normalize_mirror_url(value: &str) -> Result<Url, PlanetError> {
    let trimmed = value.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|err| PlanetError::InvalidMirror(format!("{value}: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PlanetError::InvalidMirror(format!(
            "{value}: only http and https mirrors are supported"
        )));
    }
    Ok(url)
}

fn host_label(url: &Url) -> String {
    url.host_str().unwrap_or("mirror").to_string()
}
