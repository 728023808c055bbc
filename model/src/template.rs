//! Renders OpenShift templates with `process` and submits the result.

use crate::cli::Session;
use crate::error::{self, Result};
use log::debug;
use snafu::ResultExt;
use std::path::{Path, PathBuf};

/// A template file plus the parameters to process it with.
///
/// ```ignore
/// Template::new(testdata.join("issuer-selfsigned.yaml"))
///     .param("NAME", "selfsigned")
///     .create(&session)
///     .await?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    path: PathBuf,
    params: Vec<(String, String)>,
}

impl Template {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
        }
    }

    pub fn param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn process_args(&self) -> Vec<String> {
        let mut args = vec![
            "--ignore-unknown-parameters=true".to_string(),
            "-f".to_string(),
            self.path.display().to_string(),
        ];
        for (key, value) in &self.params {
            args.push("-p".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push("-o=json".to_string());
        args
    }

    /// The processed object list as JSON.
    pub async fn render(&self, session: &Session) -> Result<String> {
        session.run("process").args(self.process_args()).output().await
    }

    /// Renders the template and runs `create -f` on the result.
    pub async fn create(&self, session: &Session) -> Result<()> {
        self.submit(session, "create").await
    }

    /// Renders the template and runs `apply -f` on the result.
    pub async fn apply(&self, session: &Session) -> Result<()> {
        self.submit(session, "apply").await
    }

    async fn submit(&self, session: &Session, verb: &str) -> Result<()> {
        let rendered = self.render(session).await?;
        let file = tempfile::Builder::new()
            .prefix("e2e-template-")
            .suffix(".json")
            .tempfile()
            .context(error::IoSnafu {
                action: "create a file for the rendered template",
            })?;
        tokio::fs::write(file.path(), rendered)
            .await
            .context(error::IoSnafu {
                action: format!("write the rendered template to {}", file.path().display()),
            })?;
        debug!(
            "Rendered {} into {}",
            self.path.display(),
            file.path().display()
        );
        session
            .run(verb)
            .args(["-f".to_string(), file.path().display().to_string()])
            .execute()
            .await
    }
}
