use anyhow::{Context, Result};
use clap::Parser;
use model::{cluster_healthcheck, cluster_sanity_check, ClusterFlavor, Session};

/// Check that nodes, cluster operators and pods are healthy, waiting for each to settle.
#[derive(Debug, Parser)]
pub(crate) struct Healthcheck {}

impl Healthcheck {
    pub(crate) async fn run(self, session: Session) -> Result<()> {
        cluster_healthcheck(&session)
            .await
            .context("The cluster is not healthy")?;
        println!("The cluster is healthy");
        Ok(())
    }
}

/// Read nodes and operators, then create and delete a throwaway project.
#[derive(Debug, Parser)]
pub(crate) struct SanityCheck {
    /// The kind of cluster [openshift|microshift].
    #[clap(long = "flavor", default_value = "openshift")]
    flavor: ClusterFlavor,
}

impl SanityCheck {
    pub(crate) async fn run(self, session: Session) -> Result<()> {
        cluster_sanity_check(&session, self.flavor)
            .await
            .context(format!("Sanity check of the {} cluster failed", self.flavor))?;
        println!("The {} cluster passed the sanity check", self.flavor);
        Ok(())
    }
}
