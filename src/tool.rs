use std::fs::{self, File};
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::error::KiraError;

/// Runs the helper scripts that fetch auxiliary metadata for a build.
///
/// `Ok(false)` means the tool ran and failed; `Err` means it could not be
/// launched at all.
pub trait ToolRunner: Send + Sync {
    fn run(
        &self,
        working_dir: &Path,
        script: &str,
        args: &[String],
        log_file: &Path,
    ) -> Result<bool, KiraError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemToolRunner;

impl SystemToolRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ToolRunner for SystemToolRunner {
    fn run(
        &self,
        working_dir: &Path,
        script: &str,
        args: &[String],
        log_file: &Path,
    ) -> Result<bool, KiraError> {
        let launch_err = |message: String| KiraError::ToolLaunch {
            script: script.to_string(),
            message,
        };

        let stdout = File::create(log_file)
            .map_err(|err| launch_err(format!("log file {}: {err}", log_file.display())))?;
        let stderr = stdout
            .try_clone()
            .map_err(|err| launch_err(err.to_string()))?;

        // script paths are resolved against the working directory up front,
        // bare names go through PATH
        let program = if script.contains('/') {
            fs::canonicalize(working_dir.join(script))
                .map_err(|err| launch_err(err.to_string()))?
        } else {
            script.into()
        };

        debug!(script, dir = %working_dir.display(), ?args, "running external tool");
        let status = Command::new(&program)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .status()
            .map_err(|err| launch_err(err.to_string()))?;

        if status.success() {
            return Ok(true);
        }
        warn!(
            script,
            code = status.code(),
            log = %log_file.display(),
            "external tool exited with failure"
        );
        Ok(false)
    }
}
