use anyhow::{ensure, Context, Result};
use clap::Parser;
use model::{get_co_status, wait_co_becomes, Session, StatusMap};
use serde::Serialize;
use std::time::Duration;

const HEALTHY: &str = "Available=True,Progressing=False,Degraded=False";

/// Read the conditions of a cluster operator once.
#[derive(Debug, Parser)]
pub(crate) struct OperatorStatus {
    /// The cluster operator, e.g. `kube-apiserver`.
    operator: String,

    /// The expected condition statuses.
    #[clap(long = "expected", default_value = HEALTHY)]
    expected: StatusMap,

    /// Output the results in JSON format.
    #[clap(long = "json")]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    operator: &'a str,
    expected: &'a StatusMap,
    actual: &'a StatusMap,
    matches: bool,
}

impl OperatorStatus {
    pub(crate) async fn run(self, session: Session) -> Result<()> {
        let actual = get_co_status(&session, &self.operator, &self.expected).await;
        let matches = actual == self.expected;
        if self.json {
            let report = Report {
                operator: &self.operator,
                expected: &self.expected,
                actual: &actual,
                matches,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&report)
                    .context("Could not create string from status.")?
            );
        } else {
            println!("{}: {}", self.operator, actual);
        }
        ensure!(
            matches,
            "Operator '{}' is {}, expected {}",
            self.operator,
            actual,
            self.expected
        );
        Ok(())
    }
}

/// Wait for a cluster operator to settle on the expected statuses.
#[derive(Debug, Parser)]
pub(crate) struct WaitOperator {
    /// The cluster operator, e.g. `kube-apiserver`.
    operator: String,

    /// The expected condition statuses.
    #[clap(long = "expected", default_value = HEALTHY)]
    expected: StatusMap,

    /// How long to wait, in seconds. Tripled on single node clusters.
    #[clap(long = "timeout", default_value = "300")]
    timeout: u64,
}

impl WaitOperator {
    pub(crate) async fn run(self, session: Session) -> Result<()> {
        wait_co_becomes(
            &session,
            &self.operator,
            Duration::from_secs(self.timeout),
            &self.expected,
        )
        .await
        .context(format!("Operator '{}' did not settle", self.operator))?;
        println!("{}: {}", self.operator, self.expected);
        Ok(())
    }
}
