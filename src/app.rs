use std::path::PathBuf;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::catalog::{Catalog, CatalogEntry, GEOFABRIK_INDEX_URL};
use crate::domain::{Mirror, format_date, format_size};
use crate::downloader::{DownloadPlan, Downloader};
use crate::error::PlanetError;
use crate::fetcher::{MetadataClient, parse_checksum};
use crate::mirror;
use crate::reconcile::{ReconcileOptions, RevisionSummary, Selection, reconcile};
use crate::store::Store;

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    pub dry_run: bool,
    pub output: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub mode: String,
    pub area: Option<String>,
    pub date: Option<String>,
    pub checksum: Option<String>,
    pub file_len: Option<u64>,
    pub urls: Vec<String>,
    pub command: String,
    pub action: String,
    pub state_file: Option<String>,
    pub ranking: Vec<RevisionSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub areas: Vec<AreaEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AreaEntry {
    pub id: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<C: MetadataClient, D: Downloader> {
    store: Store,
    client: C,
    downloader: D,
    mirrors: Vec<Mirror>,
}

impl<C: MetadataClient, D: Downloader> App<C, D> {
    pub fn new(store: Store, client: C, downloader: D, mirrors: Vec<Mirror>) -> Self {
        Self {
            store,
            client,
            downloader,
            mirrors,
        }
    }

    pub fn mirrors(&self) -> &[Mirror] {
        &self.mirrors
    }

    pub fn resolve_planet(
        &self,
        options: ReconcileOptions,
        sink: &dyn ProgressSink,
    ) -> Result<Selection, PlanetError> {
        sink.event(ProgressEvent::message(format!(
            "Retrieving available files from {} mirrors...",
            self.mirrors.len()
        )));
        let start = Instant::now();
        let sources = mirror::load_all(&self.client, &self.mirrors);
        sink.event(ProgressEvent {
            message: format!("found {} candidate files", sources.len()),
            elapsed: Some(start.elapsed()),
        });

        let selection = reconcile(&self.mirrors, sources, options)?;

        sink.event(ProgressEvent::message("Latest available files:"));
        sink.event(ProgressEvent::message(format!(
            "  {:<10}  {:>5}  {:<32}  {}",
            "date", "sites", "md5", "size"
        )));
        for revision in &selection.ranking {
            sink.event(ProgressEvent::message(format!(
                "  {:<10}  {:>5}  {:<32}  {}",
                format_date(revision.date),
                revision.mirror_count,
                revision.checksum,
                format_size(revision.file_len)
            )));
        }

        let mut notes = String::new();
        if selection.primary_excluded {
            notes.push_str(" (will not use primary)");
        }
        if let Some(newer) = &selection.skipped_newer {
            notes.push_str(&format!(
                " because the latest {} is not widespread yet",
                format_date(newer.date)
            ));
        }
        sink.event(ProgressEvent::message(format!(
            "Will download planet published on {}, size={}, md5={}, using {} sources{notes}",
            format_date(selection.date),
            format_size(selection.file_len),
            selection.checksum,
            selection.urls.len()
        )));
        for source in &selection.sources {
            let label = source
                .mirror
                .get(&self.mirrors)
                .map(|mirror| mirror.country.as_str())
                .unwrap_or("?");
            tracing::debug!("{label}: {}", source.url);
        }
        Ok(selection)
    }

    pub fn fetch_planet(
        &self,
        options: ReconcileOptions,
        download: DownloadOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, PlanetError> {
        let selection = self.resolve_planet(options, sink)?;
        let plan = DownloadPlan::new(selection.urls.clone(), Some(selection.checksum.clone()))
            .with_output(download.output.clone())
            .with_extra_args(download.extra_args.clone());
        let mut result = self.run_download("planet", &plan, download.dry_run, sink)?;
        result.date = selection.date.map(|date| format_date(Some(date)));
        result.file_len = selection.file_len;
        result.ranking = selection.ranking;
        Ok(result)
    }

    pub fn fetch_url(
        &self,
        url: &str,
        checksum: Option<String>,
        download: DownloadOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, PlanetError> {
        let plan = DownloadPlan::new(vec![url.to_string()], checksum)
            .with_output(download.output)
            .with_extra_args(download.extra_args);
        self.run_download("url", &plan, download.dry_run, sink)
    }

    pub fn load_catalog(
        &self,
        refresh: bool,
        sink: &dyn ProgressSink,
    ) -> Result<Catalog, PlanetError> {
        if !refresh {
            if let Some(text) = self.store.read_catalog() {
                match Catalog::from_json(&text) {
                    Ok(catalog) => {
                        tracing::debug!("using cached catalog {}", self.store.catalog_path());
                        return Ok(catalog);
                    }
                    Err(err) => tracing::warn!("cached catalog is unusable, refetching: {err}"),
                }
            }
        }

        sink.event(ProgressEvent::message(format!(
            "Downloading catalog {GEOFABRIK_INDEX_URL}"
        )));
        let text = self.client.fetch_text(GEOFABRIK_INDEX_URL)?;
        let catalog = Catalog::from_json(&text)?;
        if let Err(err) = self.store.write_catalog(&text) {
            tracing::warn!("unable to cache catalog: {err}");
        }
        Ok(catalog)
    }

    pub fn fetch_geofabrik(
        &self,
        query: &str,
        refresh: bool,
        state_file: Option<PathBuf>,
        download: DownloadOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, PlanetError> {
        let catalog = self.load_catalog(refresh, sink)?;
        let entry = catalog.find(query)?;
        sink.event(ProgressEvent::message(format!(
            "Found {} ({})",
            entry.qualified_name(),
            entry.qualified_id()
        )));

        let checksum = self.area_checksum(entry);
        let state_file = match state_file {
            Some(path) => Some(self.save_state(entry, path, sink)?),
            None => None,
        };

        let plan = DownloadPlan::new(vec![entry.url.clone()], checksum)
            .with_output(download.output)
            .with_extra_args(download.extra_args);
        let mut result = self.run_download("geofabrik", &plan, download.dry_run, sink)?;
        result.area = Some(entry.qualified_id().to_string());
        result.state_file = state_file;
        Ok(result)
    }

    pub fn list(
        &self,
        refresh: bool,
        filter: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<ListResult, PlanetError> {
        let catalog = self.load_catalog(refresh, sink)?;
        let areas = catalog
            .search(filter)
            .into_iter()
            .map(|entry| AreaEntry {
                id: entry.qualified_id().to_string(),
                name: entry.qualified_name().to_string(),
                url: entry.url.clone(),
            })
            .collect();
        Ok(ListResult { areas })
    }

    fn area_checksum(&self, entry: &CatalogEntry) -> Option<String> {
        let url = entry.checksum_url();
        match self.client.fetch_text(&url) {
            Ok(body) => parse_checksum(&body),
            Err(err) => {
                tracing::warn!("unable to load md5 checksum for {}: {err}", entry.url);
                None
            }
        }
    }

    fn save_state(
        &self,
        entry: &CatalogEntry,
        path: PathBuf,
        sink: &dyn ProgressSink,
    ) -> Result<String, PlanetError> {
        let url = entry.state_url().ok_or_else(|| {
            PlanetError::Data(format!("{} has no replication url", entry.qualified_id()))
        })?;
        let state = self.client.fetch_text(&url)?;
        let path = Utf8PathBuf::from_path_buf(path)
            .map_err(|_| PlanetError::Filesystem("non-utf8 state file path".to_string()))?;
        Store::write_bytes_atomic(&path, state.as_bytes())?;
        sink.event(ProgressEvent::message(format!("Saved {url} to {path}")));
        Ok(path.to_string())
    }

    fn run_download(
        &self,
        mode: &str,
        plan: &DownloadPlan,
        dry_run: bool,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, PlanetError> {
        let command = plan.command_line();
        sink.event(ProgressEvent::message(format!("  {command}")));
        let action = if dry_run {
            sink.event(ProgressEvent::message("dry run, not downloading"));
            "dry-run"
        } else {
            let start = Instant::now();
            tracing::info!("downloading from {} source(s)", plan.urls.len());
            self.downloader.download(plan)?;
            sink.event(ProgressEvent {
                message: "download complete".to_string(),
                elapsed: Some(start.elapsed()),
            });
            "download"
        };
        Ok(FetchResult {
            mode: mode.to_string(),
            area: None,
            date: None,
            checksum: plan.checksum.clone(),
            file_len: None,
            urls: plan.urls.clone(),
            command,
            action: action.to_string(),
            state_file: None,
            ranking: Vec::new(),
        })
    }
}
