use std::path::PathBuf;

use serde_json::Value;

use crate::domain::{BuildTarget, Species};
use crate::error::KiraError;
use crate::fasta::FastaSequenceParser;
use crate::serializer::RecordSink;
use crate::tabular::{TabularParser, TabularSource};

pub const GWAS_INPUT_FILE_NAME: &str = "gwascatalog.txt";
pub const DBSNP_INPUT_FILE_NAME: &str = "dbSnp142-00-All.vcf.gz";

/// A format-specific transformer bound to its input and sink.
///
/// `parse` drains the input into the sink and publishes the output on success.
/// `disconnect` releases whatever the parser holds; the dispatcher calls it
/// exactly once, after `parse`, whatever `parse` returned.
pub trait RecordParser: Send {
    fn parse(&mut self) -> Result<(), KiraError>;
    fn disconnect(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GwasFiles {
    pub catalog: PathBuf,
    pub dbsnp: PathBuf,
}

/// Everything the dispatcher validated for one build, handed to the provider.
#[derive(Debug, Clone)]
pub struct ParserInputs {
    pub target: BuildTarget,
    pub input: PathBuf,
    pub species: Option<String>,
    pub resolved_species: Option<Species>,
    pub assembly: Option<String>,
    pub reference_genome_file: Option<PathBuf>,
    pub gwas: Option<GwasFiles>,
}

pub trait ParserProvider: Send + Sync {
    fn create(
        &self,
        inputs: &ParserInputs,
        sink: Box<dyn RecordSink>,
    ) -> Result<Box<dyn RecordParser>, KiraError>;
}

/// Parsers bundled with the crate. Targets whose source formats need a
/// dedicated transformer (gene models, UniProt XML, ClinVar XML, conservation
/// wiggle files, regulatory GFF) report `ParserUnavailable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultParsers;

impl ParserProvider for DefaultParsers {
    fn create(
        &self,
        inputs: &ParserInputs,
        sink: Box<dyn RecordSink>,
    ) -> Result<Box<dyn RecordParser>, KiraError> {
        let input = inputs.input.clone();
        let parser: Box<dyn RecordParser> = match inputs.target {
            BuildTarget::GenomeSequence => Box::new(FastaSequenceParser::new(input, sink)),
            BuildTarget::Cosmic => Box::new(TabularParser::new(TabularSource::File(input), sink)),
            BuildTarget::Vep => Box::new(
                TabularParser::new(TabularSource::File(input), sink).per_input_file(),
            ),
            BuildTarget::Ppi => {
                let species = inputs.species.clone().unwrap_or_default();
                Box::new(
                    TabularParser::new(TabularSource::File(input), sink)
                        .with_field("species", Value::String(species)),
                )
            }
            BuildTarget::Gwas => {
                let catalog = inputs
                    .gwas
                    .as_ref()
                    .map(|files| files.catalog.clone())
                    .unwrap_or_else(|| input.join(GWAS_INPUT_FILE_NAME));
                Box::new(TabularParser::new(TabularSource::File(catalog), sink))
            }
            BuildTarget::Variation | BuildTarget::VariationPhenotypeAnnotation => {
                Box::new(TabularParser::new(TabularSource::Directory(input), sink))
            }
            BuildTarget::Gene
            | BuildTarget::Regulation
            | BuildTarget::Protein
            | BuildTarget::Conservation
            | BuildTarget::Drug
            | BuildTarget::Clinvar => {
                return Err(KiraError::ParserUnavailable(inputs.target.to_string()));
            }
        };
        Ok(parser)
    }
}
