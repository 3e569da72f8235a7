use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};

use crate::error::PlanetError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub trait MetadataClient: Send + Sync {
    fn fetch_text(&self, url: &str) -> Result<String, PlanetError>;

    fn fetch_length(&self, url: &str) -> Result<Option<u64>, PlanetError>;
}

#[derive(Clone)]
pub struct HttpMetadataClient {
    client: Client,
}

impl HttpMetadataClient {
    pub fn new(timeout: Duration) -> Result<Self, PlanetError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("planet-dl/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PlanetError::http("client", err))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| PlanetError::http("client", err))?;
        Ok(Self { client })
    }
}

impl MetadataClient for HttpMetadataClient {
    fn fetch_text(&self, url: &str) -> Result<String, PlanetError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| PlanetError::http(url, err))?;
        let response = check_status(url, response)?;
        if is_gzip(&response) {
            let bytes = response.bytes().map_err(|err| PlanetError::http(url, err))?;
            return gunzip_text(url, &bytes);
        }
        response.text().map_err(|err| PlanetError::http(url, err))
    }

    fn fetch_length(&self, url: &str) -> Result<Option<u64>, PlanetError> {
        let response = self
            .client
            .head(url)
            .send()
            .map_err(|err| PlanetError::http(url, err))?;
        let response = check_status(url, response)?;
        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok()))
    }
}

fn check_status(url: &str, response: Response) -> Result<Response, PlanetError> {
    let status = response.status().as_u16();
    if status >= 400 {
        return Err(PlanetError::Remote {
            url: url.to_string(),
            status,
        });
    }
    Ok(response)
}

fn is_gzip(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(is_gzip_content_type)
        .unwrap_or(false)
}

fn is_gzip_content_type(value: &str) -> bool {
    let mime = value.split(';').next().unwrap_or_default().trim();
    mime.eq_ignore_ascii_case("application/x-gzip") || mime.eq_ignore_ascii_case("application/gzip")
}

pub(crate) fn gunzip_text(url: &str, bytes: &[u8]) -> Result<String, PlanetError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|err| PlanetError::http(url, format!("invalid gzip body: {err}")))?;
    Ok(text)
}

pub fn parse_checksum(body: &str) -> Option<String> {
    body.split_whitespace().next().map(|token| token.to_string())
}
