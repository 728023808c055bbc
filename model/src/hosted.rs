/*!

Checks against a hosted control plane: a `HostedCluster` object on the management cluster whose
API server, OpenShift API server and OAuth server run as pods in the control plane namespace
`<namespace>-<name>`.

!*/

use crate::ciphers::{cipher_poll_spec, compare, CipherExpectation, HostedComponent};
use crate::cli::Session;
use crate::constants::{
    HOSTED_RESTART_WAITS, KAS_AVAILABLE_CONDITION, RESTART_POLL_INTERVAL, RESTART_RECHECKS,
};
use crate::error::{self, Result};
use crate::resource::{get_list, has_waiting_container};
use crate::wait::{self, CheckResult, CheckResultExt, PollSpec};
use k8s_openapi::api::core::v1::Pod;
use log::info;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::time::Duration;
use tokio::time::sleep;

/// Identifies a `HostedCluster` object on the management cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedCluster {
    pub name: String,
    pub namespace: String,
}

impl HostedCluster {
    pub fn new<S1: Into<String>, S2: Into<String>>(name: S1, namespace: S2) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// The namespace the control plane pods and their config maps live in.
    pub fn control_plane_namespace(&self) -> String {
        format!("{}-{}", self.namespace, self.name)
    }
}

/// The generation of the hosted cluster last acted on by its kube-apiserver.
pub async fn observed_generation(session: &Session, hosted: &HostedCluster) -> Result<i64> {
    let jsonpath = format!(
        "-o=jsonpath={{.status.conditions[?(@.type==\"{}\")].observedGeneration}}",
        KAS_AVAILABLE_CONDITION
    );
    let generation = session
        .as_admin()
        .without_namespace()
        .run("get")
        .args([
            "hostedcluster",
            hosted.name.as_str(),
            "-n",
            hosted.namespace.as_str(),
            jsonpath.as_str(),
        ])
        .output()
        .await?;
    generation.parse::<i64>().context(error::ParseIntSnafu {
        what: "observed generation",
        value: generation.as_str(),
    })
}

/// Applies a merge patch to the hosted cluster object.
pub async fn patch_hosted_cluster(session: &Session, hosted: &HostedCluster, patch: &str) -> Result<()> {
    info!("Patching hostedcluster {}: {}", hosted.name, patch);
    session
        .as_admin()
        .without_namespace()
        .run("patch")
        .args([
            "hostedcluster",
            hosted.name.as_str(),
            "-n",
            hosted.namespace.as_str(),
            "--type=merge",
            "-p",
            patch,
        ])
        .execute()
        .await
}

async fn hosted_matches(
    session: &Session,
    hosted: &HostedCluster,
    component: HostedComponent,
    expected: &CipherExpectation,
    after_generation: Option<i64>,
) -> CheckResult {
    if let Some(previous) = after_generation {
        let generation = observed_generation(session, hosted).await.transient()?;
        if generation <= previous {
            return wait::mismatch(format!(
                "observed generation {} has not passed {}",
                generation, previous
            ));
        }
    }
    let actual = component
        .observe(session, &hosted.control_plane_namespace())
        .await
        .transient()?;
    compare(component, expected, &actual)
}

/// Waits for every hosted control plane component to serve `expected`, in order. With
/// `after_generation` set, an attempt only reads the configuration once the hosted cluster's
/// observed generation is greater than it.
pub async fn verify_hosted_ciphers(
    session: &Session,
    hosted: &HostedCluster,
    expected: &CipherExpectation,
    after_generation: Option<i64>,
) -> Result<()> {
    let spec = cipher_poll_spec()?;
    for component in HostedComponent::ALL {
        let what = format!(
            "{} of hosted cluster {} to serve {}",
            component, hosted.name, expected
        );
        wait::poll(spec, &what, || {
            hosted_matches(session, hosted, component, expected, after_generation)
        })
        .await?;
    }
    Ok(())
}

fn pod_is_restarting(pod: &Pod) -> bool {
    if pod.metadata.deletion_timestamp.is_some() {
        return true;
    }
    let status = match &pod.status {
        Some(status) => status,
        None => return true,
    };
    if status.phase.as_deref() == Some("Pending") {
        return true;
    }
    let init_pending = status
        .init_container_statuses
        .iter()
        .flatten()
        .any(|c| !c.ready);
    let containers = status.container_statuses.as_deref().unwrap_or_default();
    init_pending
        || containers.is_empty()
        || containers.iter().any(|c| !c.ready)
        || has_waiting_container(pod)
}

async fn any_restarting(session: &Session, label: &str, namespace: &str) -> Result<Option<String>> {
    let pods: Vec<Pod> = get_list(
        &session.as_admin().without_namespace(),
        &["pods", "-l", label, "-n", namespace],
    )
    .await?;
    Ok(pods
        .iter()
        .find(|pod| pod_is_restarting(pod))
        .map(|pod| pod.metadata.name.clone().unwrap_or_default()))
}

async fn restarted(session: &Session, label: &str, namespace: &str) -> CheckResult {
    if let Some(pod) = any_restarting(session, label, namespace).await.transient()? {
        return wait::mismatch(format!("pod {} is restarting", pod));
    }
    for _ in 0..RESTART_RECHECKS {
        sleep(RESTART_POLL_INTERVAL).await;
        if let Some(pod) = any_restarting(session, label, namespace).await.transient()? {
            return wait::mismatch(format!("pod {} is restarting", pod));
        }
    }
    Ok(true)
}

/// Waits up to `wait` for the pods labelled `app=<app_label>` in `namespace` to settle after a
/// configuration change. A settled observation is confirmed by three more, ten seconds apart.
pub async fn wait_apiserver_restart(
    session: &Session,
    app_label: &str,
    namespace: &str,
    wait: Duration,
) -> Result<()> {
    let spec = PollSpec::new(RESTART_POLL_INTERVAL, wait)?;
    let label = format!("app={}", app_label);
    let what = format!("{} pods in {} to finish restarting", app_label, namespace);
    wait::poll(spec, &what, || restarted(session, &label, namespace)).await?;
    info!("{} has been restarted", app_label);
    Ok(())
}

/// Waits for the kube-apiserver, openshift-apiserver and oauth-openshift pods of `hosted` to
/// finish rolling out, in that order, each within its own budget.
pub async fn wait_control_plane_restart(session: &Session, hosted: &HostedCluster) -> Result<()> {
    let namespace = hosted.control_plane_namespace();
    for (app, wait) in HOSTED_RESTART_WAITS {
        wait_apiserver_restart(session, app, &namespace, wait).await?;
    }
    Ok(())
}
