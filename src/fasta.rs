use std::io::BufRead;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;
use tracing::info;

use crate::error::KiraError;
use crate::fs_util;
use crate::parser::RecordParser;
use crate::serializer::RecordSink;

pub const CHUNK_SIZE: usize = 2000;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^>(\S+)(?:\s+(.*))?$").expect("valid header regex"));
static SEQUENCE_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"dna(?:_\w+)?:(\w+)").expect("valid sequence type regex"));

/// Splits a (optionally gzipped) genome FASTA into fixed-size sequence chunks.
pub struct FastaSequenceParser {
    input: PathBuf,
    sink: Option<Box<dyn RecordSink>>,
    chunk_size: usize,
}

struct Contig {
    name: String,
    sequence_type: String,
    buffer: String,
    chunk: usize,
}

impl FastaSequenceParser {
    pub fn new(input: PathBuf, sink: Box<dyn RecordSink>) -> Self {
        Self {
            input,
            sink: Some(sink),
            chunk_size: CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn flush(
        sink: &mut dyn RecordSink,
        contig: &mut Contig,
        chunk_size: usize,
        all: bool,
    ) -> Result<usize, KiraError> {
        let mut emitted = 0;
        while contig.buffer.len() >= chunk_size || (all && !contig.buffer.is_empty()) {
            let take = contig.buffer.len().min(chunk_size);
            let rest = contig.buffer.split_off(take);
            let sequence = std::mem::replace(&mut contig.buffer, rest);
            let start = contig.chunk * chunk_size + 1;
            let record = json!({
                "sequenceName": contig.name,
                "sequenceType": contig.sequence_type,
                "chunkId": format!("{}_{}_{}k", contig.name, contig.chunk, chunk_size / 1000),
                "start": start,
                "end": start + sequence.len() - 1,
                "sequence": sequence,
            });
            sink.serialize(&record)?;
            contig.chunk += 1;
            emitted += 1;
        }
        Ok(emitted)
    }
}

impl RecordParser for FastaSequenceParser {
    fn parse(&mut self) -> Result<(), KiraError> {
        let sink = self
            .sink
            .as_deref_mut()
            .ok_or_else(|| KiraError::Parse("parser already disconnected".to_string()))?;
        let reader = fs_util::open_input(&self.input)?;

        let mut contig: Option<Contig> = None;
        let mut chunks = 0usize;
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|err| KiraError::Parse(err.to_string()))?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('>') {
                if let Some(mut done) = contig.take() {
                    chunks += Self::flush(sink, &mut done, self.chunk_size, true)?;
                }
                let caps = HEADER_RE.captures(line).ok_or_else(|| {
                    KiraError::Parse(format!("line {}: malformed FASTA header", index + 1))
                })?;
                let description = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                let sequence_type = SEQUENCE_TYPE_RE
                    .captures(description)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| "chromosome".to_string());
                contig = Some(Contig {
                    name: caps[1].to_string(),
                    sequence_type,
                    buffer: String::new(),
                    chunk: 0,
                });
                continue;
            }
            let current = contig.as_mut().ok_or_else(|| {
                KiraError::Parse(format!("line {}: sequence before first header", index + 1))
            })?;
            current.buffer.push_str(&line.to_ascii_uppercase());
            chunks += Self::flush(sink, current, self.chunk_size, false)?;
        }
        if let Some(mut done) = contig.take() {
            chunks += Self::flush(sink, &mut done, self.chunk_size, true)?;
        }

        sink.close()?;
        info!(input = %self.input.display(), chunks, "genome sequence parsed");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.sink = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::Value;

    use super::*;

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<Value>>>);

    impl RecordSink for Collect {
        fn serialize(&mut self, record: &Value) -> Result<(), KiraError> {
            self.0.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn serialize_to(&mut self, _file_stem: &str, record: &Value) -> Result<(), KiraError> {
            self.serialize(record)
        }

        fn close(&mut self) -> Result<(), KiraError> {
            Ok(())
        }
    }

    #[test]
    fn chunks_sequences_per_contig() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("genome.fa");
        std::fs::write(
            &path,
            ">1 dna:chromosome chromosome:GRCh38:1:1:10:1 REF\nacgtac\ngtac\n>MT dna:chromosome\nNNN\n",
        )
        .unwrap();

        let records = Collect::default();
        let mut parser =
            FastaSequenceParser::new(path, Box::new(records.clone())).with_chunk_size(4);
        parser.parse().unwrap();
        parser.disconnect();

        let records = records.0.lock().unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0]["sequence"], "ACGT");
        assert_eq!(records[0]["sequenceType"], "chromosome");
        assert_eq!(records[2]["start"], 9);
        assert_eq!(records[2]["end"], 10);
        assert_eq!(records[3]["sequenceName"], "MT");
        assert_eq!(records[3]["chunkId"], "MT_0_0k");
    }

    #[test]
    fn rejects_sequence_without_header() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("broken.fa");
        std::fs::write(&path, "ACGT\n").unwrap();

        let mut parser = FastaSequenceParser::new(path, Box::new(Collect::default()));
        assert!(matches!(parser.parse(), Err(KiraError::Parse(_))));
    }
}
