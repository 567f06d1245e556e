use std::fs;

use assert_matches::assert_matches;

use kira_reference_builder::config::{Config, ConfigLoader};
use kira_reference_builder::error::KiraError;

#[test]
fn load_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-rb.json");
    fs::write(
        &path,
        r#"{
  "schema_version": 1,
  "species": [
    {"id": "hsapiens", "scientific_name": "Homo sapiens",
     "common_name": "human", "default_assembly": "GRCh38",
     "assemblies": ["GRCh37"]}
  ],
  "scripts_dir": "/opt/ensembl-scripts",
  "ensembl_libs": "/opt/ensembl/libs",
  "fail_on_parse_error": true,
  "store": {"root": "/data/kira-rb"}
}"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.schema_version, 1);
    assert_eq!(resolved.catalog.resolve("human").unwrap().assemblies, ["GRCh37"]);
    assert_eq!(resolved.scripts_dir, "/opt/ensembl-scripts");
    assert_eq!(resolved.ensembl_libs, "/opt/ensembl/libs");
    assert!(resolved.fail_on_parse_error);
    let store = resolved.store.unwrap();
    assert_eq!(store.root, "/data/kira-rb");
    assert!(store.options.is_empty());
}

#[test]
fn missing_explicit_config_is_a_read_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, KiraError::ConfigRead(_));
    assert!(err.is_configuration());
}

#[test]
fn malformed_config_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-rb.json");
    fs::write(&path, "{\"species\": 3}").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, KiraError::ConfigParse(_));
}

#[test]
fn species_need_id_and_default_assembly() {
    let config: Config = serde_json::from_str(
        r#"{"species": [{"id": "", "scientific_name": "Danio rerio",
            "common_name": "zebrafish", "default_assembly": "GRCz11"}]}"#,
    )
    .unwrap();
    let err = ConfigLoader::resolve_config(config).unwrap_err();
    assert_matches!(err, KiraError::ConfigParse(message) if message.contains("Danio rerio"));
}
