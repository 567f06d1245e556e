use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::{Builder, NamedTempFile};
use tracing::debug;

use crate::error::KiraError;

/// Destination for normalized records produced by a parser.
pub trait RecordSink: Send {
    /// Writes under the sink's own entity category.
    fn serialize(&mut self, record: &Value) -> Result<(), KiraError>;

    /// Writes under an explicit file stem, for targets whose records spread over
    /// several outputs.
    fn serialize_to(&mut self, file_stem: &str, record: &Value) -> Result<(), KiraError>;

    /// Flushes and publishes everything written so far.
    fn close(&mut self) -> Result<(), KiraError>;
}

/// JSON-lines writer, one `<stem>.json` per category in the output directory.
///
/// Records go to a temporary file first; only `close` moves it into place, so
/// an interrupted build leaves no partial output behind.
pub struct JsonSerializer {
    output_dir: PathBuf,
    category: Option<String>,
    writers: BTreeMap<String, BufWriter<NamedTempFile>>,
}

impl JsonSerializer {
    pub fn new(output_dir: impl Into<PathBuf>, category: Option<&str>) -> Self {
        Self {
            output_dir: output_dir.into(),
            category: category.map(str::to_string),
            writers: BTreeMap::new(),
        }
    }

    pub fn output_path(&self, file_stem: &str) -> PathBuf {
        self.output_dir.join(format!("{file_stem}.json"))
    }

    fn writer(&mut self, file_stem: &str) -> Result<&mut BufWriter<NamedTempFile>, KiraError> {
        if file_stem.is_empty() || file_stem.contains(['/', '\\']) || file_stem.starts_with('.') {
            return Err(KiraError::Serialization(format!(
                "invalid output name '{file_stem}'"
            )));
        }
        if !self.writers.contains_key(file_stem) {
            let temp = Builder::new()
                .prefix(".kira-rb-")
                .suffix(".json.tmp")
                .tempfile_in(&self.output_dir)
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
            self.writers
                .insert(file_stem.to_string(), BufWriter::new(temp));
        }
        self.writers
            .get_mut(file_stem)
            .ok_or_else(|| KiraError::Serialization(format!("no writer for {file_stem}")))
    }
}

impl RecordSink for JsonSerializer {
    fn serialize(&mut self, record: &Value) -> Result<(), KiraError> {
        let category = self.category.clone().ok_or_else(|| {
            KiraError::Serialization("serializer has no default category".to_string())
        })?;
        self.serialize_to(&category, record)
    }

    fn serialize_to(&mut self, file_stem: &str, record: &Value) -> Result<(), KiraError> {
        let writer = self.writer(file_stem)?;
        serde_json::to_writer(&mut *writer, record)
            .map_err(|err| KiraError::Serialization(err.to_string()))?;
        writer
            .write_all(b"\n")
            .map_err(|err| KiraError::Filesystem(err.to_string()))
    }

    fn close(&mut self) -> Result<(), KiraError> {
        let writers = std::mem::take(&mut self.writers);
        for (stem, writer) in writers {
            let temp = writer
                .into_inner()
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
            let destination = self.output_path(&stem);
            temp.persist(&destination)
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
            debug!(path = %destination.display(), "serialized output published");
        }
        Ok(())
    }
}

/// Reads back a JSON-lines file written by [`JsonSerializer`].
pub fn read_json_lines(path: &Path) -> Result<Vec<Value>, KiraError> {
    let content =
        std::fs::read_to_string(path).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|err| KiraError::Serialization(err.to_string()))
        })
        .collect()
}
