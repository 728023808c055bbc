use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use model::{
    observed_generation, patch_hosted_cluster, verify_hosted_ciphers, wait_control_plane_restart,
    CipherExpectation, HostedCluster, Session,
};

/// Wait for the control plane of a hosted cluster to serve the expected ciphers, optionally after
/// applying a merge patch to the hosted cluster.
#[derive(Debug, Parser)]
pub(crate) struct VerifyHostedCiphers {
    /// The expected configuration, e.g. `["TLS_AES_128_GCM_SHA256"] VersionTLS13`.
    expected: CipherExpectation,

    /// Name of the `HostedCluster` object.
    #[clap(long = "name")]
    name: String,

    /// Namespace of the `HostedCluster` object on the management cluster.
    #[clap(long = "hosted-namespace", default_value = "clusters")]
    hosted_namespace: String,

    /// A JSON merge patch to apply to the hosted cluster first. The ciphers are then only read
    /// once the control plane has observed a newer generation.
    #[clap(long = "patch")]
    patch: Option<String>,

    /// Only read the configuration once the observed generation is greater than this.
    #[clap(long = "after-generation", conflicts_with = "patch")]
    after_generation: Option<i64>,
}

impl VerifyHostedCiphers {
    pub(crate) async fn run(self, session: Session) -> Result<()> {
        let hosted = HostedCluster::new(&self.name, &self.hosted_namespace);
        let mut after_generation = self.after_generation;
        if let Some(patch) = &self.patch {
            let generation = observed_generation(&session, &hosted)
                .await
                .context("Unable to read the hosted cluster's observed generation")?;
            patch_hosted_cluster(&session, &hosted, patch)
                .await
                .context(format!("Unable to patch hosted cluster '{}'", self.name))?;
            info!("Patched hosted cluster '{}' at generation {}", self.name, generation);
            wait_control_plane_restart(&session, &hosted)
                .await
                .context("The hosted control plane did not finish restarting")?;
            after_generation = Some(generation);
        }
        verify_hosted_ciphers(&session, &hosted, &self.expected, after_generation)
            .await
            .context(format!(
                "Hosted cluster '{}' is not serving the expected ciphers",
                self.name
            ))?;
        println!("{}: {}", self.name, self.expected);
        Ok(())
    }
}
