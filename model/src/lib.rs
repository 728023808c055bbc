/*!

This library is the harness for end-to-end tests of a cluster's API servers, authentication and
certificate management. Scenarios drive the cluster through the `oc` CLI via a [`Session`], then
wait for the cluster to converge with the condition poller in [`wait`] and the verifiers built on
it.

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

pub use ciphers::{
    verify_all_ciphers, verify_ciphers, CipherExpectation, ConfigSource, HostedComponent,
    ServingInfo,
};
pub use cli::{CommandBuilder, Executor, Invocation, Output, ProcessExecutor, Session};
pub use encryption::{wait_encryption_key_migration, EncryptedServer, EncryptionSecret};
pub use error::{Error, Result};
pub use health::{
    cluster_healthcheck, cluster_sanity_check, nodes_healthcheck, operators_healthcheck,
    pods_healthcheck, ClusterFlavor,
};
pub use hosted::{
    observed_generation, patch_hosted_cluster, verify_hosted_ciphers, wait_apiserver_restart,
    wait_control_plane_restart, HostedCluster,
};
pub use resource::{
    dump_resource, get_conditions, get_resource, get_resource_to_be_ready, get_with_kubeconfig,
    pods_with_label, wait_for_pods_redeployed, wait_for_resource_readiness, Condition,
};
pub use status::{
    check_co_status, get_co_status, is_single_node, kas_operator_check_for_step, wait_co_becomes,
    wait_co_status, StabilityPolicy, StatusMap,
};
pub use template::Template;
pub use wait::{CheckError, CheckResult, CheckResultExt, PollSpec};
pub use webhook::compare_webhook_conditions;

mod ciphers;
pub mod cli;
pub mod constants;
mod encryption;
mod error;
mod health;
mod hosted;
mod resource;
mod status;
mod template;
#[cfg(test)]
mod testing;
pub mod wait;
mod webhook;

/// `len` random lowercase alphanumeric characters (at most 32), for names that must not collide
/// across test runs.
pub fn random_suffix(len: usize) -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(len)
        .collect()
}
