use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("output directory {0} doesn't exist")]
    OutputMissing(PathBuf),

    #[error("{0} is not a directory")]
    OutputNotDirectory(PathBuf),

    #[error("build option '{0}' is not valid")]
    #[diagnostic(help("run `kira-rb targets` to list the supported build targets"))]
    InvalidTarget(String),

    #[error("'{0}' builder is not implemented yet")]
    NotImplemented(String),

    #[error("input '{0}' doesn't exist")]
    InputMissing(String),

    #[error("{path} is a directory: it must be a file for {target} builder")]
    InputIsDirectory { path: PathBuf, target: String },

    #[error("'{0}' is not a directory")]
    InputNotDirectory(PathBuf),

    #[error("'{option}' option is mandatory for '{target}' builder")]
    MissingOption { option: String, target: String },

    #[error("assembly '{assembly}' is not valid. Possible values: {accepted}")]
    InvalidAssembly { assembly: String, accepted: String },

    #[error("required file {0} doesn't exist")]
    MissingRequiredFile(PathBuf),

    #[error("species '{0}' not found in the configured catalog")]
    UnknownSpecies(String),

    #[error("no parser available for '{0}' builder")]
    ParserUnavailable(String),

    #[error("missing config file kira-rb.json (current directory or user config directory)")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to launch {script}: {message}")]
    ToolLaunch { script: String, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("adaptor registry has no configuration")]
    RegistryNotConfigured,

    #[error("adaptor registry not initialized for {species} ({assembly})")]
    RegistryNotInitialized { species: String, assembly: String },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl KiraError {
    /// Errors that reject a build request before any parser exists.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            KiraError::OutputMissing(_)
                | KiraError::OutputNotDirectory(_)
                | KiraError::InvalidTarget(_)
                | KiraError::NotImplemented(_)
                | KiraError::InputMissing(_)
                | KiraError::InputIsDirectory { .. }
                | KiraError::InputNotDirectory(_)
                | KiraError::MissingOption { .. }
                | KiraError::InvalidAssembly { .. }
                | KiraError::MissingRequiredFile(_)
                | KiraError::UnknownSpecies(_)
                | KiraError::ParserUnavailable(_)
                | KiraError::MissingConfig
                | KiraError::ConfigRead(_)
                | KiraError::ConfigParse(_)
        )
    }
}
