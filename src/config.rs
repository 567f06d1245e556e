use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{Species, SpeciesCatalog};
use crate::error::KiraError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-rb.json";
pub const DEFAULT_SCRIPTS_DIR: &str = "bin/ensembl-scripts";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub species: Vec<Species>,
    #[serde(default)]
    pub scripts_dir: Option<String>,
    #[serde(default)]
    pub ensembl_libs: Option<String>,
    #[serde(default)]
    pub fail_on_parse_error: Option<bool>,
    #[serde(default)]
    pub store: Option<RegistryConfig>,
}

/// Backing-store settings handed to the adaptor registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegistryConfig {
    pub root: Utf8PathBuf,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub catalog: SpeciesCatalog,
    pub scripts_dir: Utf8PathBuf,
    pub ensembl_libs: String,
    pub fail_on_parse_error: bool,
    pub store: Option<RegistryConfig>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => implicit_config_paths()
                .into_iter()
                .find(|candidate| candidate.exists())
                .ok_or(KiraError::MissingConfig)?,
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let schema_version = config.schema_version.unwrap_or(1);

        for species in &config.species {
            if species.id.trim().is_empty() || species.default_assembly.trim().is_empty() {
                return Err(KiraError::ConfigParse(format!(
                    "species '{}' needs an id and a default_assembly",
                    species.scientific_name
                )));
            }
        }

        Ok(ResolvedConfig {
            schema_version,
            catalog: SpeciesCatalog::new(config.species),
            scripts_dir: config
                .scripts_dir
                .map(Utf8PathBuf::from)
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_SCRIPTS_DIR)),
            ensembl_libs: config.ensembl_libs.unwrap_or_default(),
            fail_on_parse_error: config.fail_on_parse_error.unwrap_or(false),
            store: config.store,
        })
    }
}

/// `kira-rb.json` in the working directory, then the per-user config dir.
fn implicit_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
    if let Some(dirs) = BaseDirs::new() {
        paths.push(dirs.config_dir().join("kira-rb").join(DEFAULT_CONFIG_FILE));
    }
    paths
}
