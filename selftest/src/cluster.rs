use crate::test_settings::TestSettings;
use anyhow::{format_err, Context, Result};
use log::{info, warn};
use model::constants::{PROJECT_RETRY_INTERVAL, PROJECT_RETRY_TIMEOUT};
use model::wait::{self, PollSpec};
use model::{random_suffix, HostedCluster, ProcessExecutor, Session};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const GUEST_KUBECONFIG_FILENAME: &str = "kubeconfig";

/// The cluster under test, as described by the `E2E_*` environment variables. Files extracted
/// from the cluster live in a scratch directory that is removed with the `Cluster`.
#[derive(Debug)]
pub struct Cluster {
    session: Session,
    hosted: Option<HostedCluster>,
    scratch_dir: TempDir,
}

impl Cluster {
    pub fn from_env() -> Result<Cluster> {
        let mut session = Session::new(ProcessExecutor::new(TestSettings::oc_path()));
        if let Some(path) = TestSettings::kubeconfig() {
            session = session.with_kubeconfig(path);
        }
        if let Some(path) = TestSettings::admin_kubeconfig() {
            session = session.with_admin_kubeconfig(path);
        }
        if let Some(path) = TestSettings::guest_kubeconfig() {
            session = session.with_guest_kubeconfig(path);
        }
        let hosted = TestSettings::hosted_cluster_name()
            .map(|name| HostedCluster::new(name, TestSettings::hosted_cluster_namespace()));
        Ok(Self {
            session,
            hosted,
            scratch_dir: TempDir::new()?,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The hosted cluster to run hosted scenarios against, if one is configured.
    pub fn hosted(&self) -> Option<&HostedCluster> {
        self.hosted.as_ref()
    }

    /// Returns the path to a manifest template in the testdata directory.
    pub fn testdata(name: &str) -> PathBuf {
        TestSettings::testdata_dir().join(name)
    }

    /// A session whose guest view talks to the hosted cluster. Without `E2E_GUEST_KUBECONFIG`
    /// the hosted cluster's admin kubeconfig is extracted into the scratch directory.
    pub async fn guest_session(&self) -> Result<Session> {
        if TestSettings::guest_kubeconfig().is_some() {
            return Ok(self.session.clone());
        }
        let hosted = self
            .hosted
            .as_ref()
            .ok_or_else(|| format_err!("E2E_HOSTED_CLUSTER_NAME is not set"))?;
        let dir = self.scratch_dir.path();
        self.session
            .as_admin()
            .without_namespace()
            .run("extract")
            .args([
                format!("secret/{}-admin-kubeconfig", hosted.name),
                "-n".to_string(),
                hosted.namespace.clone(),
                format!("--to={}", dir.display()),
                "--confirm".to_string(),
            ])
            .execute()
            .await
            .context("Unable to extract the hosted cluster's kubeconfig")?;
        Ok(self
            .session
            .clone()
            .with_guest_kubeconfig(dir.join(GUEST_KUBECONFIG_FILENAME)))
    }

    /// Creates a project with a unique name starting with `prefix`. The returned session uses it
    /// as its namespace; the project is deleted when the guard goes out of scope.
    pub async fn create_project(&self, prefix: &str) -> Result<ScopedProject> {
        let name = format!("{}-{}", prefix, random_suffix(8));
        let spec = PollSpec::new(PROJECT_RETRY_INTERVAL, PROJECT_RETRY_TIMEOUT)?.immediate();
        let what = format!("project {} to be created", name);
        wait::eventually(spec, &what, || {
            self.session
                .run("new-project")
                .args([name.as_str(), "--skip-config-write"])
                .execute()
        })
        .await?;
        info!("Created project '{}'", name);
        Ok(ScopedProject {
            session: self.session.clone().with_namespace(&name),
            name,
            oc: TestSettings::oc_path().to_path_buf(),
            kubeconfig: TestSettings::admin_kubeconfig()
                .or_else(TestSettings::kubeconfig)
                .map(Path::to_path_buf),
        })
    }
}

/// A project owned by one scenario. The `Drop` trait is implemented deleting the project when it
/// goes out of scope.
#[derive(Debug)]
pub struct ScopedProject {
    name: String,
    session: Session,
    oc: PathBuf,
    kubeconfig: Option<PathBuf>,
}

impl ScopedProject {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cluster session with this project as its namespace.
    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl Drop for ScopedProject {
    fn drop(&mut self) {
        use std::process::Command;
        let mut command = Command::new(&self.oc);
        command.arg("delete");
        if let Some(kubeconfig) = &self.kubeconfig {
            command.arg(format!("--kubeconfig={}", kubeconfig.display()));
        }
        command
            .arg("project")
            .arg(&self.name)
            .arg("--ignore-not-found")
            .arg("--wait=false");
        match command.output() {
            Ok(output) if output.status.success() => info!("Deleted project '{}'", self.name),
            Ok(output) => warn!(
                "Unable to delete project '{}': {}",
                self.name,
                String::from_utf8_lossy(&output.stderr)
            ),
            Err(e) => warn!("Unable to run '{}': {}", self.oc.display(), e),
        }
    }
}
