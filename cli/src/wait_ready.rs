use anyhow::{Context, Result};
use clap::Parser;
use model::wait::secs;
use model::{wait_for_resource_readiness, Session};

/// Wait for an object, e.g. a cert-manager `Certificate`, to report `Ready=True`.
#[derive(Debug, Parser)]
pub(crate) struct WaitReady {
    /// The kind of the object, e.g. `certificate`.
    kind: String,

    /// The name of the object.
    name: String,

    /// Seconds between checks.
    #[clap(long = "interval", default_value = "10")]
    interval: u64,

    /// Seconds to wait in total.
    #[clap(long = "timeout", default_value = "300")]
    timeout: u64,
}

impl WaitReady {
    pub(crate) async fn run(self, session: Session) -> Result<()> {
        let spec = secs(self.interval, self.timeout).context("Invalid wait")?;
        wait_for_resource_readiness(&session, session.namespace(), &self.kind, &self.name, spec)
            .await
            .context(format!("{} '{}' is not ready", self.kind, self.name))?;
        println!("{}/{} is ready", self.kind, self.name);
        Ok(())
    }
}
