//! Whole-cluster health and sanity checks run before and after disruptive scenarios.

use crate::cli::Session;
use crate::constants::{
    NODES_HEALTH_TIMEOUT, NODES_POLL_INTERVAL, OPERATORS_HEALTH_TIMEOUT, OPERATORS_POLL_INTERVAL,
    PODS_HEALTH_TIMEOUT, PODS_POLL_INTERVAL, PROJECT_RETRY_INTERVAL, PROJECT_RETRY_TIMEOUT, READY,
    TRUE,
};
use crate::error::{self, Result};
use crate::random_suffix;
use crate::resource::{get_list, get_resource, has_waiting_container, Condition};
use crate::status::StatusMap;
use crate::wait::{self, CheckResult, CheckResultExt, PollSpec};
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};
use std::time::Duration;

/// The kind of cluster a sanity check runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterFlavor {
    /// Full OpenShift: projects and cluster operators are available.
    OpenShift,
    /// MicroShift: plain namespaces, no cluster operators.
    MicroShift,
}

serde_plain::derive_display_from_serialize!(ClusterFlavor);
serde_plain::derive_fromstr_from_deserialize!(ClusterFlavor);

#[derive(Debug, Deserialize)]
struct ClusterOperator {
    metadata: ObjectMeta,
    status: Option<ClusterOperatorStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct ClusterOperatorStatus {
    #[serde(default)]
    conditions: Vec<Condition>,
}

impl ClusterOperator {
    fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    fn status_map(&self) -> StatusMap {
        let healthy = StatusMap::healthy();
        self.status
            .iter()
            .flat_map(|s| s.conditions.iter())
            .filter(|c| healthy.get(&c.type_).is_some())
            .map(|c| (c.type_.as_str(), c.status.as_str()))
            .collect()
    }
}

fn node_problem(node: &Node) -> Option<&'static str> {
    if node.spec.as_ref().and_then(|s| s.unschedulable) == Some(true) {
        return Some("SchedulingDisabled");
    }
    let ready = node
        .status
        .iter()
        .flat_map(|s| s.conditions.iter().flatten())
        .any(|c| c.type_ == READY && c.status == TRUE);
    if !ready {
        return Some("NotReady");
    }
    None
}

fn pod_is_healthy(pod: &Pod) -> bool {
    match pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
        Some("Succeeded") => true,
        Some("Running") => !has_waiting_container(pod),
        _ => false,
    }
}

fn is_installer(pod: &Pod) -> bool {
    pod.metadata
        .name
        .as_deref()
        .map(|name| name.contains("installer"))
        .unwrap_or(false)
}

async fn log_listing(session: &Session, kind: &str) {
    match get_resource(session, &[kind]).await {
        Ok(listing) => info!("{}:\n{}", kind, listing),
        Err(e) => warn!("Unable to list {}: {}", kind, e),
    }
}

async fn nodes_are_normal(session: &Session) -> CheckResult {
    let nodes: Vec<Node> = get_list(session, &["nodes"]).await.transient()?;
    for node in &nodes {
        if let Some(problem) = node_problem(node) {
            return wait::mismatch(format!(
                "node {} is {}",
                node.metadata.name.as_deref().unwrap_or_default(),
                problem
            ));
        }
    }
    Ok(true)
}

/// Waits up to `timeout` for every node to be Ready and schedulable.
pub async fn nodes_healthcheck(session: &Session, timeout: Duration) -> Result<()> {
    let admin = session.as_admin().without_namespace();
    let result = wait::poll(
        PollSpec::new(NODES_POLL_INTERVAL, timeout)?,
        "nodes to be normal",
        || nodes_are_normal(&admin),
    )
    .await;
    log_listing(&admin, "nodes").await;
    result.map(|_| info!("Nodes are normal"))
}

async fn operators_are_normal(session: &Session) -> CheckResult {
    let operators: Vec<ClusterOperator> = get_list(session, &["co"]).await.transient()?;
    for operator in &operators {
        let status = operator.status_map();
        if !status.is_healthy_baseline() {
            return wait::mismatch(format!("operator {} is {}", operator.name(), status));
        }
    }
    Ok(true)
}

/// Waits up to `timeout` for every cluster operator to be available, settled and not degraded.
pub async fn operators_healthcheck(session: &Session, timeout: Duration) -> Result<()> {
    let admin = session.as_admin().without_namespace();
    let result = wait::poll(
        PollSpec::new(OPERATORS_POLL_INTERVAL, timeout)?,
        "cluster operators to be normal",
        || operators_are_normal(&admin),
    )
    .await;
    log_listing(&admin, "co").await;
    result.map(|_| info!("No abnormality found in cluster operators"))
}

async fn pods_are_normal(session: &Session) -> CheckResult {
    let pods: Vec<Pod> = get_list(session, &["pods", "-A"]).await.transient()?;
    let abnormal: Vec<String> = pods
        .iter()
        .filter(|pod| !is_installer(pod) && !pod_is_healthy(pod))
        .map(|pod| {
            format!(
                "{}/{}",
                pod.metadata.namespace.as_deref().unwrap_or_default(),
                pod.metadata.name.as_deref().unwrap_or_default()
            )
        })
        .collect();
    if !abnormal.is_empty() {
        return wait::mismatch(format!("abnormal pods: {}", abnormal.join(", ")));
    }
    Ok(true)
}

/// Waits up to `timeout` for every pod, installer pods aside, to be running or completed.
pub async fn pods_healthcheck(session: &Session, timeout: Duration) -> Result<()> {
    let admin = session.as_admin().without_namespace();
    wait::poll(
        PollSpec::new(PODS_POLL_INTERVAL, timeout)?,
        "pods to be normal",
        || pods_are_normal(&admin),
    )
    .await?;
    info!("No abnormality found in pods");
    Ok(())
}

/// Node, operator and pod health checks in turn, with their default budgets.
pub async fn cluster_healthcheck(session: &Session) -> Result<()> {
    nodes_healthcheck(session, NODES_HEALTH_TIMEOUT)
        .await
        .context(error::HealthCheckSnafu { area: "nodes" })?;
    operators_healthcheck(session, OPERATORS_HEALTH_TIMEOUT)
        .await
        .context(error::HealthCheckSnafu { area: "operators" })?;
    pods_healthcheck(session, PODS_HEALTH_TIMEOUT)
        .await
        .context(error::HealthCheckSnafu { area: "pods" })?;
    Ok(())
}

/// Checks that the API is reachable and that a namespace can be created and deleted.
pub async fn cluster_sanity_check(session: &Session, flavor: ClusterFlavor) -> Result<()> {
    let admin = session.as_admin().without_namespace();
    let mut failures = Vec::new();

    if let Err(e) = get_resource(&admin, &["node"]).await {
        warn!("Unable to fetch node status: {}", e);
    }

    let name = format!("e2e-sanity-{}", random_suffix(8));
    let (kind, create) = match flavor {
        ClusterFlavor::OpenShift => {
            if let Err(e) = get_resource(&admin, &["co"]).await {
                failures.push(format!("unable to fetch cluster operators: {}", e));
            }
            let spec = PollSpec::new(PROJECT_RETRY_INTERVAL, PROJECT_RETRY_TIMEOUT)?.immediate();
            let what = format!("project {} to be created", name);
            let created = wait::eventually(spec, &what, || {
                admin
                    .run("new-project")
                    .args([name.as_str(), "--skip-config-write"])
                    .execute()
            })
            .await;
            ("project", created)
        }
        ClusterFlavor::MicroShift => {
            let created = admin
                .run("create")
                .args(["ns", name.as_str()])
                .execute()
                .await;
            ("ns", created)
        }
    };
    if let Err(e) = create {
        failures.push(format!("unable to create {} {}: {}", kind, name, e));
    }

    if let Err(e) = admin
        .run("delete")
        .args([kind, name.as_str(), "--ignore-not-found"])
        .execute()
        .await
    {
        failures.push(format!("unable to delete {} {}: {}", kind, name, e));
    }

    ensure!(failures.is_empty(), error::SanityCheckSnafu { failures });
    info!("Cluster sanity check passed");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use crate::testing::ScriptedExecutor;
    use serde_json::{json, Value};

    fn list(items: Vec<Value>) -> String {
        json!({"apiVersion": "v1", "kind": "List", "items": items}).to_string()
    }

    fn node(name: &str, ready: &str, unschedulable: bool) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": {"name": name},
            "spec": {"unschedulable": unschedulable},
            "status": {"conditions": [{"type": "Ready", "status": ready}]}
        })
    }

    fn operator(name: &str, available: &str, progressing: &str, degraded: &str) -> Value {
        json!({
            "apiVersion": "config.openshift.io/v1",
            "kind": "ClusterOperator",
            "metadata": {"name": name},
            "status": {"conditions": [
                {"type": "Available", "status": available},
                {"type": "Progressing", "status": progressing},
                {"type": "Degraded", "status": degraded},
                {"type": "Upgradeable", "status": "True"}
            ]}
        })
    }

    fn pod(namespace: &str, name: &str, phase: &str) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": name, "namespace": namespace},
            "status": {"phase": phase}
        })
    }

    #[tokio::test(start_paused = true)]
    async fn nodes_become_normal() {
        let executor = ScriptedExecutor::new();
        executor.on(
            &["get", "nodes", "-o", "json"],
            vec![
                ScriptedExecutor::stdout(&list(vec![
                    node("master-0", "True", false),
                    node("worker-0", "Unknown", false),
                ])),
                ScriptedExecutor::stdout(&list(vec![
                    node("master-0", "True", false),
                    node("worker-0", "True", true),
                ])),
                ScriptedExecutor::stdout(&list(vec![
                    node("master-0", "True", false),
                    node("worker-0", "True", false),
                ])),
            ],
        );
        let session = Session::new(executor.clone());
        nodes_healthcheck(&session, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(executor.count(&["nodes", "json"]), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn operators_need_the_healthy_baseline() {
        let executor = ScriptedExecutor::new();
        executor.on(
            &["get", "co", "-o", "json"],
            vec![
                ScriptedExecutor::stdout(&list(vec![
                    operator("authentication", "True", "True", "False"),
                    operator("kube-apiserver", "True", "False", "False"),
                ])),
                ScriptedExecutor::stdout(&list(vec![
                    operator("authentication", "True", "False", "False"),
                    operator("kube-apiserver", "True", "False", "False"),
                ])),
            ],
        );
        let session = Session::new(executor.clone());
        operators_healthcheck(&session, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(executor.count(&["co", "json"]), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn installer_pods_are_ignored() {
        let executor = ScriptedExecutor::new();
        executor.on(
            &["get", "pods", "-A"],
            vec![
                ScriptedExecutor::stdout(&list(vec![
                    pod("openshift-kube-apiserver", "installer-7-master-0", "Failed"),
                    pod("openshift-kube-apiserver", "kube-apiserver-master-0", "Pending"),
                ])),
                ScriptedExecutor::stdout(&list(vec![
                    pod("openshift-kube-apiserver", "installer-7-master-0", "Failed"),
                    pod("openshift-kube-apiserver", "kube-apiserver-master-0", "Running"),
                    pod("openshift-etcd", "revision-pruner-7-master-0", "Succeeded"),
                ])),
            ],
        );
        let session = Session::new(executor.clone());
        pods_healthcheck(&session, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(executor.calls().len(), 2);
    }

    fn crash_looping_pod(namespace: &str, name: &str) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": name, "namespace": namespace},
            "status": {
                "phase": "Running",
                "containerStatuses": [{
                    "name": "oauth-openshift",
                    "image": "oauth",
                    "imageID": "",
                    "ready": false,
                    "restartCount": 42,
                    "state": {"waiting": {"reason": "CrashLoopBackOff"}}
                }]
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn crash_looping_pods_are_abnormal() {
        let executor = ScriptedExecutor::new();
        executor.on(
            &["get", "pods", "-A"],
            vec![ScriptedExecutor::stdout(&list(vec![
                pod("openshift-etcd", "etcd-master-0", "Running"),
                crash_looping_pod("openshift-authentication", "oauth-openshift-5c7d"),
            ]))],
        );
        let session = Session::new(executor.clone());
        let err = pods_healthcheck(&session, Duration::from_secs(20))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "{}", err);
        assert!(
            err.to_string()
                .contains("openshift-authentication/oauth-openshift-5c7d"),
            "{}",
            err
        );
        assert!(!err.to_string().contains("etcd-master-0"), "{}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn healthcheck_names_the_failing_area() {
        let executor = ScriptedExecutor::new();
        executor.on(
            &["get", "nodes", "-o", "json"],
            vec![ScriptedExecutor::stdout(&list(vec![node("master-0", "True", false)]))],
        );
        executor.on(
            &["get", "co", "-o", "json"],
            vec![ScriptedExecutor::stdout(&list(vec![operator(
                "etcd", "True", "False", "True",
            )]))],
        );
        let session = Session::new(executor.clone());
        let err = cluster_healthcheck(&session).await.unwrap_err();
        assert!(
            matches!(&err, Error::HealthCheck { area, .. } if area == "operators"),
            "{}",
            err
        );
        assert!(err.to_string().contains("etcd"), "{}", err);
        assert_eq!(executor.count(&["pods"]), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sanity_check_retries_project_creation() {
        let executor = ScriptedExecutor::new();
        executor.on(&["get", "node"], vec![ScriptedExecutor::stdout("master-0 Ready")]);
        executor.on(&["get", "co"], vec![ScriptedExecutor::stdout("authentication True")]);
        executor.on(
            &["new-project", "--skip-config-write"],
            vec![
                ScriptedExecutor::failure("the server is currently unable to handle the request"),
                ScriptedExecutor::stdout("Now using project"),
            ],
        );
        executor.on(&["delete", "project"], vec![ScriptedExecutor::stdout("deleted")]);
        let session = Session::new(executor.clone()).with_namespace("ignored");
        cluster_sanity_check(&session, ClusterFlavor::OpenShift)
            .await
            .unwrap();
        assert_eq!(executor.count(&["new-project"]), 2);
        assert_eq!(executor.count(&["--namespace"]), 0);
    }

    #[tokio::test]
    async fn microshift_failures_are_aggregated() {
        let executor = ScriptedExecutor::new();
        executor.on(&["get", "node"], vec![ScriptedExecutor::stdout("microshift Ready")]);
        executor.on(&["create", "ns"], vec![ScriptedExecutor::failure("forbidden")]);
        executor.on(&["delete", "ns"], vec![ScriptedExecutor::stdout("")]);
        let session = Session::new(executor.clone());
        let err = cluster_sanity_check(&session, ClusterFlavor::MicroShift)
            .await
            .unwrap_err();
        assert!(
            matches!(&err, Error::SanityCheck { failures } if failures.len() == 1),
            "{}",
            err
        );
        assert!(err.to_string().contains("forbidden"), "{}", err);
        assert_eq!(executor.count(&["co"]), 0);
        assert_eq!("microshift".parse::<ClusterFlavor>().unwrap(), ClusterFlavor::MicroShift);
    }
}
