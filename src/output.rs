use std::io::{self, Write};

use serde::Serialize;

use crate::dispatch::{BuildOutcome, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_outcome(outcome: &BuildOutcome) -> io::Result<()> {
        Self::print_json(outcome)
    }

    pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
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

/// Progress lines on stderr for interactive runs.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!(
                "[{:?}] {} ({:.1}s)",
                event.phase,
                event.message,
                elapsed.as_secs_f64()
            ),
            None => eprintln!("[{:?}] {}", event.phase, event.message),
        }
    }
}
