use crate::cli::Session;
use crate::constants::{CONFIG_MANAGED_NAMESPACE, ENCRYPTION_POLL_INTERVAL};
use crate::error::{self, Result};
use crate::wait::{self, CheckResult, CheckResultExt, PollSpec};
use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use std::time::Duration;

const ROUTES_MIGRATED_REGEX: &str = r"migrated-resources: .*route.openshift.io.*routes";
const CONFIGMAPS_SECRETS_MIGRATED_REGEX: &str = r"migrated-resources: .*configmaps.*secrets.*";

lazy_static! {
    static ref ROUTES_MIGRATED: Regex = {
        #[allow(clippy::unwrap_used)]
        Regex::new(ROUTES_MIGRATED_REGEX).unwrap()
    };
    static ref CONFIGMAPS_SECRETS_MIGRATED: Regex = {
        #[allow(clippy::unwrap_used)]
        Regex::new(CONFIGMAPS_SECRETS_MIGRATED_REGEX).unwrap()
    };
}

/// The API server whose storage an encryption key secret covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptedServer {
    OpenShiftApiServer,
    KubeApiServer,
}

impl EncryptedServer {
    /// How long migrating every resource to a new key may take.
    pub fn migration_budget(self) -> Duration {
        match self {
            EncryptedServer::OpenShiftApiServer => Duration::from_secs(15 * 60),
            EncryptedServer::KubeApiServer => Duration::from_secs(30 * 60),
        }
    }

    fn migrated(self) -> &'static Regex {
        match self {
            EncryptedServer::OpenShiftApiServer => &ROUTES_MIGRATED,
            EncryptedServer::KubeApiServer => &CONFIGMAPS_SECRETS_MIGRATED,
        }
    }
}

/// An encryption key secret in `openshift-config-managed`, e.g.
/// `encryption-key-openshift-kube-apiserver-3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionSecret {
    name: String,
    server: EncryptedServer,
}

impl EncryptionSecret {
    pub fn from_name<S: Into<String>>(name: S) -> Result<Self> {
        let name = name.into();
        let server = if name.contains("openshift-apiserver") {
            EncryptedServer::OpenShiftApiServer
        } else if name.contains("openshift-kube-apiserver") {
            EncryptedServer::KubeApiServer
        } else {
            return error::UnknownEncryptionSecretSnafu { secret: name }.fail();
        };
        Ok(Self { name, server })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server(&self) -> EncryptedServer {
        self.server
    }
}

async fn migrated(session: &Session, secret: &EncryptionSecret) -> CheckResult {
    let yaml = session
        .without_namespace()
        .run("get")
        .args([
            "secrets",
            secret.name.as_str(),
            "-n",
            CONFIG_MANAGED_NAMESPACE,
            "-o=yaml",
        ])
        .output()
        .await
        .transient()?;
    match secret.server.migrated().find(&yaml) {
        Some(found) => {
            info!("Saw all migrated-resources:\n{}", found.as_str());
            Ok(true)
        }
        None => wait::mismatch("migrated-resources not complete yet"),
    }
}

/// Waits for the annotation on `secret` that says every resource of its server was re-encrypted.
pub async fn wait_encryption_key_migration(
    session: &Session,
    secret: &EncryptionSecret,
) -> Result<()> {
    let spec = PollSpec::new(ENCRYPTION_POLL_INTERVAL, secret.server.migration_budget())?;
    let what = format!("resources encrypted with {} to be migrated", secret.name);
    wait::poll(spec, &what, || migrated(session, secret)).await?;
    Ok(())
}
