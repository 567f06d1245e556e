use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::error::KiraError;

/// Opens a text input, decompressing `.gz` files on the fly.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead + Send>, KiraError> {
    let file = File::open(path)
        .map_err(|err| KiraError::Filesystem(format!("open {}: {err}", path.display())))?;
    let is_gz = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if is_gz {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Regular files directly inside `dir`, sorted by name. Hidden files are skipped.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>, KiraError> {
    let entries = fs::read_dir(dir)
        .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", dir.display())))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let path = entry.path();
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with('.'))
            .unwrap_or(true);
        if path.is_file() && !hidden {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File name with any `.gz` and data extension stripped, e.g.
/// `chr1.phastCons.tsv.gz` -> `chr1.phastCons`.
pub fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}
