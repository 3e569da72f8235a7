use std::io::{self, Write};

use serde::Serialize;

use crate::app::{FetchResult, ListResult, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => println!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => println!("{}", event.message),
        }
    }
}

impl ConsoleOutput {
    pub fn print_list(result: &ListResult) {
        let width = result
            .areas
            .iter()
            .map(|area| area.id.len())
            .max()
            .unwrap_or(0);
        for area in &result.areas {
            println!("{:<width$}  {}", area.id, area.name);
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
