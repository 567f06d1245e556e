use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::KiraError;
use crate::fs_util;
use crate::parser::RecordParser;
use crate::serializer::RecordSink;

pub enum TabularSource {
    File(PathBuf),
    /// Every regular file in the directory; each one is written to its own
    /// output named after the file.
    Directory(PathBuf),
}

/// Tab-delimited exports with a header row (COSMIC, GWAS catalog, VEP tables,
/// PSI-MI TAB, Ensembl variation dumps).
///
/// Lines starting with `##` are metadata and skipped. The header is the first
/// remaining line, with a leading `#` removed. Every following line becomes a
/// JSON object keyed by the header columns.
pub struct TabularParser {
    source: TabularSource,
    sink: Option<Box<dyn RecordSink>>,
    extra: Vec<(String, Value)>,
    per_file: bool,
}

impl TabularParser {
    pub fn new(source: TabularSource, sink: Box<dyn RecordSink>) -> Self {
        Self {
            source,
            sink: Some(sink),
            extra: Vec::new(),
            per_file: false,
        }
    }

    /// Names the output after the input file instead of the sink's category.
    pub fn per_input_file(mut self) -> Self {
        self.per_file = true;
        self
    }

    /// Adds a constant field to every record.
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.extra.push((key.to_string(), value));
        self
    }

    fn parse_file(
        &self,
        path: &Path,
        sink: &mut dyn RecordSink,
        file_stem: Option<&str>,
    ) -> Result<usize, KiraError> {
        let reader = fs_util::open_input(path)?;
        let mut header: Option<Vec<String>> = None;
        let mut rows = 0usize;

        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|err| KiraError::Parse(err.to_string()))?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() || line.starts_with("##") {
                continue;
            }
            let Some(columns) = header.as_ref() else {
                header = Some(
                    line.trim_start_matches('#')
                        .split('\t')
                        .map(|name| name.trim().to_string())
                        .collect(),
                );
                continue;
            };

            let values = line.split('\t').collect::<Vec<_>>();
            if values.len() != columns.len() {
                return Err(KiraError::Parse(format!(
                    "{}:{}: expected {} columns, found {}",
                    path.display(),
                    index + 1,
                    columns.len(),
                    values.len()
                )));
            }

            let mut record = Map::with_capacity(columns.len() + self.extra.len());
            for (name, value) in columns.iter().zip(values) {
                record.insert(name.clone(), Value::String(value.to_string()));
            }
            for (key, value) in &self.extra {
                record.insert(key.clone(), value.clone());
            }
            let record = Value::Object(record);
            match file_stem {
                Some(stem) => sink.serialize_to(stem, &record)?,
                None => sink.serialize(&record)?,
            }
            rows += 1;
        }
        debug!(path = %path.display(), rows, "tabular file parsed");
        Ok(rows)
    }
}

impl RecordParser for TabularParser {
    fn parse(&mut self) -> Result<(), KiraError> {
        let mut sink = self
            .sink
            .take()
            .ok_or_else(|| KiraError::Parse("parser already disconnected".to_string()))?;

        let result = match &self.source {
            TabularSource::File(path) => {
                let stem = self.per_file.then(|| fs_util::file_stem(path));
                self.parse_file(path, sink.as_mut(), stem.as_deref())
            }
            TabularSource::Directory(dir) => fs_util::list_files(dir).and_then(|files| {
                let mut total = 0;
                for file in files {
                    let stem = fs_util::file_stem(&file);
                    total += self.parse_file(&file, sink.as_mut(), Some(&stem))?;
                }
                Ok(total)
            }),
        };
        let outcome = result.and_then(|rows| sink.close().map(|_| rows));
        // keep the sink until disconnect so a failed parse drops its temp files there
        self.sink = Some(sink);

        let rows = outcome?;
        info!(rows, "tabular input parsed");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.sink = None;
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::serializer::{JsonSerializer, read_json_lines};

    use super::*;

    #[test]
    fn header_keyed_records() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("cosmic.tsv");
        fs::write(
            &input,
            "## exported\n#Gene name\tMutation ID\nBRAF\tCOSM476\nKRAS\tCOSM521\n",
        )
        .unwrap();
        let out = temp.path().join("out");
        fs::create_dir(&out).unwrap();

        let sink = JsonSerializer::new(&out, Some("cosmic"));
        let mut parser = TabularParser::new(TabularSource::File(input), Box::new(sink))
            .with_field("source", Value::String("cosmic".to_string()));
        parser.parse().unwrap();
        parser.disconnect();

        let records = read_json_lines(&out.join("cosmic.json")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Gene name"], "BRAF");
        assert_eq!(records[1]["Mutation ID"], "COSM521");
        assert_eq!(records[1]["source"], "cosmic");
    }

    #[test]
    fn ragged_row_fails_without_output() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("gwas.tsv");
        fs::write(&input, "a\tb\n1\t2\n3\n").unwrap();
        let out = temp.path().join("out");
        fs::create_dir(&out).unwrap();

        let sink = JsonSerializer::new(&out, Some("gwas"));
        let mut parser = TabularParser::new(TabularSource::File(input), Box::new(sink));
        let err = parser.parse().unwrap_err();
        assert!(err.to_string().contains("expected 2 columns"));
        parser.disconnect();
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn directory_input_writes_per_file() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("variation");
        fs::create_dir(&input).unwrap();
        fs::write(input.join("chr1.tsv"), "id\tpos\nrs1\t10\n").unwrap();
        fs::write(input.join("chr2.tsv"), "id\tpos\nrs2\t20\nrs3\t30\n").unwrap();
        let out = temp.path().join("out");
        fs::create_dir(&out).unwrap();

        let sink = JsonSerializer::new(&out, None);
        let mut parser = TabularParser::new(TabularSource::Directory(input), Box::new(sink));
        parser.parse().unwrap();
        parser.disconnect();

        assert_eq!(read_json_lines(&out.join("chr1.json")).unwrap().len(), 1);
        assert_eq!(read_json_lines(&out.join("chr2.json")).unwrap().len(), 2);
    }

    #[test]
    fn per_input_file_names_output_after_input() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("effects.txt.gz");
        let mut encoder = flate2::write::GzEncoder::new(
            fs::File::create(&input).unwrap(),
            flate2::Compression::default(),
        );
        std::io::Write::write_all(
            &mut encoder,
            b"#Uploaded_variation\tConsequence\nrs699\tmissense_variant\n",
        )
        .unwrap();
        encoder.finish().unwrap();
        let out = temp.path().join("out");
        fs::create_dir(&out).unwrap();

        let sink = JsonSerializer::new(&out, None);
        let mut parser =
            TabularParser::new(TabularSource::File(input), Box::new(sink)).per_input_file();
        parser.parse().unwrap();

        let records = read_json_lines(&out.join("effects.json")).unwrap();
        assert_eq!(records[0]["Consequence"], "missense_variant");
    }
}
