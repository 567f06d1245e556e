use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::ResolvedConfig;
use crate::domain::{AuxiliaryStep, BuildTarget, ClinvarAssembly, InputKind, MandatoryOption, Species};
use crate::error::KiraError;
use crate::parser::{
    DBSNP_INPUT_FILE_NAME, GWAS_INPUT_FILE_NAME, GwasFiles, ParserInputs, ParserProvider,
    RecordParser,
};
use crate::serializer::JsonSerializer;
use crate::tool::ToolRunner;

#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub target: String,
    pub input: Option<PathBuf>,
    pub output: PathBuf,
    pub species: Option<String>,
    pub assembly: Option<String>,
    pub reference_genome_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildStatus {
    Completed,
    ParseFailed { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct AuxiliaryResult {
    pub script: String,
    pub log_file: String,
    pub succeeded: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    pub target: String,
    pub species: Option<String>,
    pub output: String,
    pub status: BuildStatus,
    pub auxiliary: Option<AuxiliaryResult>,
    pub started_at: String,
    pub finished_at: String,
}

impl BuildOutcome {
    pub fn is_complete(&self) -> bool {
        self.status == BuildStatus::Completed
    }

    /// A failed parse or an auxiliary tool that could not be launched. A tool
    /// that ran and exited non-zero does not count.
    pub fn has_failures(&self) -> bool {
        !self.is_complete()
            || self
                .auxiliary
                .as_ref()
                .is_some_and(|aux| aux.error.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validate,
    Auxiliary,
    Parse,
    Cleanup,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Calls `disconnect` when dropped, so cleanup runs on every exit path once a
/// parser exists.
struct Connected(Box<dyn RecordParser>);

impl Drop for Connected {
    fn drop(&mut self) {
        self.0.disconnect();
    }
}

pub struct BuildDispatcher<T: ToolRunner, P: ParserProvider> {
    config: ResolvedConfig,
    tools: T,
    parsers: P,
}

impl<T: ToolRunner, P: ParserProvider> BuildDispatcher<T, P> {
    pub fn new(config: ResolvedConfig, tools: T, parsers: P) -> Self {
        Self {
            config,
            tools,
            parsers,
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Runs one build target end to end.
    ///
    /// Configuration problems are returned as errors before any parser is
    /// built. Failures inside the parser are logged and reported through
    /// [`BuildStatus::ParseFailed`]; cleanup has already happened by then.
    pub fn execute(
        &self,
        request: &BuildRequest,
        sink: &dyn ProgressSink,
    ) -> Result<BuildOutcome, KiraError> {
        let started_at = Utc::now();
        let clock = Instant::now();

        check_output_dir(&request.output)?;

        let species = request.species.as_deref().and_then(|name| {
            let found = self.config.catalog.resolve(name);
            if found.is_none() {
                warn!(species = name, "species not found in catalog, continuing unresolved");
            }
            found.cloned()
        });

        let target: BuildTarget = request.target.parse().inspect_err(|err| error!("{err}"))?;
        if !target.is_implemented() {
            return Err(KiraError::NotImplemented(target.to_string()));
        }

        sink.event(ProgressEvent {
            phase: Phase::Validate,
            message: format!("validating inputs for {target}"),
            elapsed: None,
        });
        let spec = target.input_spec();
        let input = check_input(target, request.input.as_deref(), spec.kind)?;
        for option in spec.mandatory {
            check_mandatory(target, *option, request)?;
        }
        if target == BuildTarget::Clinvar {
            let assembly = request.assembly.as_deref().unwrap_or_default();
            assembly.parse::<ClinvarAssembly>()?;
        }
        if target == BuildTarget::Gene {
            if let Some(reference) = request.reference_genome_file.as_deref() {
                if !reference.is_file() {
                    return Err(KiraError::InputMissing(reference.display().to_string()));
                }
            }
        }
        let gwas = match target {
            BuildTarget::Gwas => Some(check_gwas_files(&input)?),
            _ => None,
        };

        let auxiliary = match target.auxiliary() {
            Some(step) => {
                let species = species.as_ref().ok_or_else(|| match &request.species {
                    Some(name) => KiraError::UnknownSpecies(name.clone()),
                    None => KiraError::MissingOption {
                        option: MandatoryOption::Species.to_string(),
                        target: target.to_string(),
                    },
                })?;
                sink.event(ProgressEvent {
                    phase: Phase::Auxiliary,
                    message: format!("running {}", step.script()),
                    elapsed: Some(clock.elapsed()),
                });
                Some(self.run_auxiliary(step, species, &input, &request.output))
            }
            None => None,
        };

        let inputs = ParserInputs {
            target,
            input,
            species: request.species.clone(),
            resolved_species: species.clone(),
            assembly: request.assembly.clone(),
            reference_genome_file: request.reference_genome_file.clone(),
            gwas,
        };
        let serializer = JsonSerializer::new(&request.output, target.category());
        let mut parser = Connected(self.parsers.create(&inputs, Box::new(serializer))?);

        sink.event(ProgressEvent {
            phase: Phase::Parse,
            message: format!("building {target}"),
            elapsed: Some(clock.elapsed()),
        });
        let status = match parser.0.parse() {
            Ok(()) => {
                info!(target = %target, elapsed = ?clock.elapsed(), "build finished");
                BuildStatus::Completed
            }
            Err(err) => {
                error!(target = %target, error = %err, "error executing build");
                BuildStatus::ParseFailed {
                    message: err.to_string(),
                }
            }
        };

        sink.event(ProgressEvent {
            phase: Phase::Cleanup,
            message: format!("releasing {target} parser"),
            elapsed: Some(clock.elapsed()),
        });
        drop(parser);

        Ok(BuildOutcome {
            target: target.to_string(),
            species: species.map(|sp| sp.id),
            output: request.output.display().to_string(),
            status,
            auxiliary,
            started_at: started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
        })
    }

    /// Fetches supplementary metadata with an external script. Never fails the
    /// build: problems end up in the returned result and the log.
    fn run_auxiliary(
        &self,
        step: AuxiliaryStep,
        species: &Species,
        input: &Path,
        output: &Path,
    ) -> AuxiliaryResult {
        let libs = self.config.ensembl_libs.clone();
        let (args, log_file, produced) = match step {
            AuxiliaryStep::GenomeInfo => {
                let info_file = output.join("genome_info.json");
                let args = vec![
                    "--species".to_string(),
                    species.scientific_name.clone(),
                    "-o".to_string(),
                    info_file.display().to_string(),
                    "--ensembl-libs".to_string(),
                    libs,
                ];
                (args, output.join("genome_info.log"), info_file)
            }
            AuxiliaryStep::ProteinFunctionPrediction => {
                let args = vec![
                    "--species".to_string(),
                    species.scientific_name.clone(),
                    "--outdir".to_string(),
                    input.display().to_string(),
                    "--ensembl-libs".to_string(),
                    libs,
                ];
                (
                    args,
                    input.join("protein_function_prediction_matrices.log"),
                    input.to_path_buf(),
                )
            }
        };

        let script = step.script();
        let result = self.tools.run(
            self.config.scripts_dir.as_std_path(),
            script,
            &args,
            &log_file,
        );
        let (succeeded, error) = match result {
            Ok(true) => {
                info!(path = %produced.display(), "{script} created OK");
                (true, None)
            }
            Ok(false) => {
                error!(
                    species = %species.scientific_name,
                    log = %log_file.display(),
                    "{script} failed, continuing without its output"
                );
                (false, None)
            }
            Err(err) => {
                error!(error = %err, "{script} could not be launched, continuing");
                (false, Some(err.to_string()))
            }
        };

        AuxiliaryResult {
            script: script.to_string(),
            log_file: log_file.display().to_string(),
            succeeded,
            error,
        }
    }
}

fn check_output_dir(output: &Path) -> Result<(), KiraError> {
    if !output.exists() {
        return Err(KiraError::OutputMissing(output.to_path_buf()));
    }
    if !output.is_dir() {
        return Err(KiraError::OutputNotDirectory(output.to_path_buf()));
    }
    Ok(())
}

fn check_input(
    target: BuildTarget,
    input: Option<&Path>,
    kind: InputKind,
) -> Result<PathBuf, KiraError> {
    let input = input.ok_or_else(|| KiraError::MissingOption {
        option: "input".to_string(),
        target: target.to_string(),
    })?;
    if !input.exists() {
        return Err(KiraError::InputMissing(input.display().to_string()));
    }
    match kind {
        InputKind::File if input.is_dir() => Err(KiraError::InputIsDirectory {
            path: input.to_path_buf(),
            target: target.to_string(),
        }),
        InputKind::Directory if !input.is_dir() => {
            Err(KiraError::InputNotDirectory(input.to_path_buf()))
        }
        _ => Ok(input.to_path_buf()),
    }
}

fn check_mandatory(
    target: BuildTarget,
    option: MandatoryOption,
    request: &BuildRequest,
) -> Result<(), KiraError> {
    let present = match option {
        MandatoryOption::Species => request.species.is_some(),
        MandatoryOption::Assembly => request.assembly.is_some(),
        MandatoryOption::ReferenceGenomeFile => request.reference_genome_file.is_some(),
    };
    if present {
        return Ok(());
    }
    Err(KiraError::MissingOption {
        option: option.to_string(),
        target: target.to_string(),
    })
}

fn check_gwas_files(input: &Path) -> Result<GwasFiles, KiraError> {
    let files = GwasFiles {
        catalog: input.join(GWAS_INPUT_FILE_NAME),
        dbsnp: input.join(DBSNP_INPUT_FILE_NAME),
    };
    for path in [&files.catalog, &files.dbsnp] {
        if !path.is_file() {
            return Err(KiraError::MissingRequiredFile(path.clone()));
        }
    }
    Ok(files)
}
