use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    pub country: String,
    pub url: String,
    #[serde(default)]
    pub avoid_by_default: bool,
}

impl Mirror {
    pub fn new(country: &str, url: &str) -> Self {
        Self {
            country: country.to_string(),
            url: url.to_string(),
            avoid_by_default: false,
        }
    }

    pub fn avoided(mut self) -> Self {
        self.avoid_by_default = true;
        self
    }
}

impl fmt::Display for Mirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.country, self.url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MirrorId(pub usize);

impl MirrorId {
    pub fn get<'a>(&self, mirrors: &'a [Mirror]) -> Option<&'a Mirror> {
        mirrors.get(self.0)
    }
}

/// `timestamp` is `None` for the `planet-latest` alias. `checksum` and
/// `file_len` stay `None` when the corresponding fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    pub timestamp: Option<NaiveDate>,
    pub mirror: MirrorId,
    pub checksum_url: Option<String>,
    pub checksum: Option<String>,
    pub file_len: Option<u64>,
}

impl Source {
    pub fn new(name: &str, url: &str, timestamp: Option<NaiveDate>, mirror: MirrorId) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            timestamp,
            mirror,
            checksum_url: None,
            checksum: None,
            file_len: None,
        }
    }

    pub fn is_latest_alias(&self) -> bool {
        self.timestamp.is_none()
    }

    pub fn size_display(&self) -> String {
        format_size(self.file_len)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {}", self.name, self.url)
    }
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => "unknown".to_string(),
    }
}

pub fn format_size(len: Option<u64>) -> String {
    match len {
        Some(len) => format!(
            "{:.1} MB ({})",
            len as f64 / 1024.0 / 1024.0,
            group_thousands(len)
        ),
        None => "unknown".to_string(),
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
