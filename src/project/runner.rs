//! External simulation-model runner.
//!
//! The core never interprets model results; it only launches the
//! executable, blocks until it exits, and hands back the exit status and
//! captured output lines. No timeout and no retries - callers needing
//! cancellation must wrap the call externally.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::Result;

/// Launches the external model executable from a workspace directory.
#[derive(Clone, Debug)]
pub struct ModelRunner {
    exe: PathBuf,
    args: Vec<String>,
    workspace: Option<PathBuf>,
}

impl ModelRunner {
    /// A bare executable name is resolved through the search path at run
    /// time; anything with a path component is used as-is.
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self {
            exe: exe.into(),
            args: Vec::new(),
            workspace: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn workspace(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace = Some(dir.into());
        self
    }

    /// Run the model to completion. Returns whether it exited successfully
    /// and the captured stdout lines.
    pub fn run(&self) -> Result<(bool, Vec<String>)> {
        let exe = self.resolve_exe()?;
        log::info!("running model executable {}", exe.display());

        let mut command = Command::new(&exe);
        command.args(&self.args);
        if let Some(dir) = &self.workspace {
            command.current_dir(dir);
        }

        let output = command.output()?;
        let lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_owned)
            .collect();

        if !output.status.success() {
            log::warn!("model exited with status {}", output.status);
        }

        Ok((output.status.success(), lines))
    }

    fn resolve_exe(&self) -> Result<PathBuf> {
        if self.exe.components().count() > 1 || self.exe.is_absolute() {
            return Ok(self.exe.clone());
        }
        which::which(&self.exe).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("model executable {} not found: {}", self.exe.display(), e),
            )
            .into()
        })
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }
}
