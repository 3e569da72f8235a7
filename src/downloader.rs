use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use crate::error::PlanetError;

pub const ARIA2C: &str = "aria2c";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadPlan {
    pub urls: Vec<String>,
    pub checksum: Option<String>,
    pub output: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

impl DownloadPlan {
    pub fn new(urls: Vec<String>, checksum: Option<String>) -> Self {
        Self {
            urls,
            checksum,
            output: None,
            extra_args: Vec::new(),
        }
    }

    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    pub fn with_extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    pub fn command_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(checksum) = &self.checksum {
            args.push(format!("--checksum=md5={checksum}"));
        }
        if self.urls.len() > 1 && !self.has_split_override() {
            args.push(format!("--split={}", self.urls.len()));
        }
        if let Some(output) = &self.output {
            if let Some(dir) = output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                args.push(format!("--dir={}", dir.display()));
            }
            if let Some(name) = output.file_name() {
                args.push(format!("--out={}", name.to_string_lossy()));
            }
        }
        args.extend(self.extra_args.iter().cloned());
        args.extend(self.urls.iter().cloned());
        args
    }

    pub fn command_line(&self) -> String {
        std::iter::once(ARIA2C.to_string())
            .chain(self.command_args())
            .map(|arg| shell_quote(&arg))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn has_split_override(&self) -> bool {
        self.extra_args
            .iter()
            .any(|arg| arg.starts_with("-s") || arg.starts_with("--split"))
    }
}

pub trait Downloader: Send + Sync {
    fn download(&self, plan: &DownloadPlan) -> Result<(), PlanetError>;
    fn tool_version(&self) -> Option<String>;
}

#[derive(Clone)]
pub struct Aria2Downloader {
    aria2c: Option<PathBuf>,
}

impl Aria2Downloader {
    pub fn new() -> Self {
        Self {
            aria2c: find_in_path(ARIA2C),
        }
    }

    fn require_aria2c(&self) -> Result<&PathBuf, PlanetError> {
        self.aria2c
            .as_ref()
            .ok_or_else(|| PlanetError::MissingTool(ARIA2C.to_string()))
    }
}

impl Default for Aria2Downloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader for Aria2Downloader {
    fn download(&self, plan: &DownloadPlan) -> Result<(), PlanetError> {
        let program = self.require_aria2c()?;
        tracing::debug!("running {}", plan.command_line());
        let status = Command::new(program)
            .args(plan.command_args())
            .status()
            .map_err(|err| PlanetError::Downloader(err.to_string()))?;
        if status.success() {
            return Ok(());
        }
        Err(PlanetError::Downloader(match status.code() {
            Some(code) => format!("{ARIA2C} exited with code {code}"),
            None => format!("{ARIA2C} was terminated by a signal"),
        }))
    }

    fn tool_version(&self) -> Option<String> {
        let program = self.aria2c.as_ref()?;
        tool_version(program, &["--version"])
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

fn tool_version(path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(path).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
}

fn shell_quote(arg: &str) -> String {
    let plain = arg
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || "-_=./:,@%+".contains(ch));
    if plain && !arg.is_empty() {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
