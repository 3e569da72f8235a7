#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use planet_dl::app::{ProgressEvent, ProgressSink};
use planet_dl::downloader::{DownloadPlan, Downloader};
use planet_dl::error::PlanetError;
use planet_dl::fetcher::MetadataClient;

/// In-memory stand-in for the HTTP client. Unknown URLs answer 404.
///
/// Clones share the request log.
#[derive(Default, Clone)]
pub struct MockClient {
    pages: HashMap<String, String>,
    lengths: HashMap<String, Option<u64>>,
    requests: Arc<Mutex<Vec<String>>>,
}

pub struct PlanetFile<'a> {
    pub name: &'a str,
    pub md5: Option<&'a str>,
    pub len: Option<u64>,
}

pub fn file<'a>(name: &'a str, md5: Option<&'a str>, len: Option<u64>) -> PlanetFile<'a> {
    PlanetFile { name, md5, len }
}

impl MockClient {
    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn length(mut self, url: &str, len: Option<u64>) -> Self {
        self.lengths.insert(url.to_string(), len);
        self
    }

    /// Serves a directory listing at `base` plus each file's md5 sidecar and HEAD length.
    pub fn mirror(mut self, base: &str, files: &[PlanetFile<'_>]) -> Self {
        let mut html = String::from("<html><body><h1>Index</h1><pre>\n<a href=\"../\">../</a>\n");
        for planet in files {
            html.push_str(&format!("<a href=\"{0}\">{0}</a>\n", planet.name));
            self.lengths
                .insert(format!("{base}{}", planet.name), planet.len);
            if let Some(md5) = planet.md5 {
                let sidecar = format!("{}.md5", planet.name);
                html.push_str(&format!("<a href=\"{0}\">{0}</a>\n", sidecar));
                self.pages.insert(
                    format!("{base}{sidecar}"),
                    format!("{md5}  {}\n", planet.name),
                );
            }
        }
        html.push_str("</pre></body></html>");
        self.pages.insert(base.to_string(), html);
        self
    }

    pub fn requested(&self, url: &str) -> bool {
        self.request_count(url) > 0
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|seen| *seen == url)
            .count()
    }
}

impl MetadataClient for MockClient {
    fn fetch_text(&self, url: &str) -> Result<String, PlanetError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().ok_or(PlanetError::Remote {
            url: url.to_string(),
            status: 404,
        })
    }

    fn fetch_length(&self, url: &str) -> Result<Option<u64>, PlanetError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.lengths.get(url).copied().ok_or(PlanetError::Remote {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Records plans instead of running aria2c. Clones share the record.
#[derive(Default, Clone)]
pub struct RecordingDownloader {
    pub plans: Arc<Mutex<Vec<DownloadPlan>>>,
}

impl RecordingDownloader {
    pub fn plans(&self) -> Vec<DownloadPlan> {
        self.plans.lock().unwrap().clone()
    }
}

impl Downloader for RecordingDownloader {
    fn download(&self, plan: &DownloadPlan) -> Result<(), PlanetError> {
        self.plans.lock().unwrap().push(plan.clone());
        Ok(())
    }

    fn tool_version(&self) -> Option<String> {
        Some("aria2 version 1.37.0".to_string())
    }
}

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Default)]
pub struct CollectingSink {
    pub messages: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn contains(&self, needle: &str) -> bool {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .any(|message| message.contains(needle))
    }
}

impl ProgressSink for CollectingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}
