/*!

This is the command line interface for ad-hoc checks of a cluster's API servers, authentication
and certificate management, using the same waits and verifiers as the end-to-end scenarios.

!*/

mod encryption;
mod health;
mod hosted_ciphers;
mod operator;
mod verify_ciphers;
mod wait_ready;

use anyhow::Result;
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use model::cli::DEFAULT_CLI;
use model::{ProcessExecutor, Session};
use std::path::PathBuf;

/// Checks and waits against a running cluster, driven through the cluster CLI.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Args {
    /// Set logging verbosity [trace|debug|info|warn|error]. If the environment variable `RUST_LOG`
    /// is present, it overrides the default logging behavior. See https://docs.rs/env_logger/latest
    #[clap(long = "log-level", default_value = "info")]
    log_level: LevelFilter,
    /// Path to the kubeconfig file. Without it the CLI falls back to `KUBECONFIG` or its own
    /// default.
    #[clap(long = "kubeconfig")]
    kubeconfig: Option<PathBuf>,
    /// Path to the kubeconfig used for cluster-admin reads. Defaults to `--kubeconfig`.
    #[clap(long = "admin-kubeconfig")]
    admin_kubeconfig: Option<PathBuf>,
    /// Namespace for namespaced commands.
    #[clap(long = "namespace", short = 'n')]
    namespace: Option<String>,
    /// The cluster CLI binary to run.
    #[clap(long = "oc", default_value = DEFAULT_CLI)]
    oc: PathBuf,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
enum Command {
    /// Compare the conditions of a cluster operator with the expected statuses once.
    OperatorStatus(operator::OperatorStatus),
    /// Wait for a cluster operator to report the expected statuses and stay there.
    WaitOperator(operator::WaitOperator),
    /// Wait for components to serve the expected cipher suites and minimum TLS version.
    VerifyCiphers(verify_ciphers::VerifyCiphers),
    /// Wait for the control plane of a hosted cluster to serve the expected ciphers.
    VerifyHostedCiphers(hosted_ciphers::VerifyHostedCiphers),
    /// Check that nodes, cluster operators and pods are healthy.
    Healthcheck(health::Healthcheck),
    /// Run a quick create/delete round trip against the cluster.
    SanityCheck(health::SanityCheck),
    /// Wait for an object to report `Ready=True`.
    WaitReady(wait_ready::WaitReady),
    /// Wait for an encryption key's resources to be migrated.
    WaitEncryptionMigration(encryption::WaitEncryptionMigration),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(args.log_level);
    if let Err(e) = run(args).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut session = Session::new(ProcessExecutor::new(args.oc));
    if let Some(path) = args.kubeconfig {
        session = session.with_kubeconfig(path);
    }
    if let Some(path) = args.admin_kubeconfig {
        session = session.with_admin_kubeconfig(path);
    }
    if let Some(namespace) = args.namespace {
        session = session.with_namespace(namespace);
    }
    match args.command {
        Command::OperatorStatus(status) => status.run(session).await,
        Command::WaitOperator(wait) => wait.run(session).await,
        Command::VerifyCiphers(verify) => verify.run(session).await,
        Command::VerifyHostedCiphers(verify) => verify.run(session).await,
        Command::Healthcheck(check) => check.run(session).await,
        Command::SanityCheck(check) => check.run(session).await,
        Command::WaitReady(wait) => wait.run(session).await,
        Command::WaitEncryptionMigration(wait) => wait.run(session).await,
    }
}

/// Initialize the logger with the value passed by `--log-level` (or its default) when the
/// `RUST_LOG` environment variable is not present. If present, the `RUST_LOG` environment variable
/// overrides `--log-level`/`level`.
fn init_logger(level: LevelFilter) {
    match std::env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => {
            // RUST_LOG exists; env_logger will use it.
            Builder::from_default_env().init();
        }
        None => {
            // RUST_LOG does not exist; log this crate and the harness at the given level.
            Builder::new()
                .filter(Some(env!("CARGO_CRATE_NAME")), level)
                .filter(Some("e2e_model"), level)
                .init();
        }
    }
}
