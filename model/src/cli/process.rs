use super::{Executor, Invocation, Output};
use crate::error::{self, Result};
use async_trait::async_trait;
use snafu::ResultExt;
use std::path::PathBuf;
use tokio::process::Command;

/// The default name of the cluster CLI binary, expected to be found via `$PATH`.
pub const DEFAULT_CLI: &str = "oc";

/// An [`Executor`] that spawns the cluster CLI as a child process.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: PathBuf,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_CLI)
    }
}

impl ProcessExecutor {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, invocation: &Invocation) -> Result<Output> {
        let output = Command::new(&self.program)
            .args(&invocation.args)
            .kill_on_drop(true)
            .output()
            .await
            .context(error::SpawnSnafu {
                program: self.program.clone(),
            })?;
        Ok(Output {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
