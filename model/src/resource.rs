//! Generic reads and readiness waits for cluster objects.

use crate::cli::Session;
use crate::constants::{
    KUBECONFIG_POLL_INTERVAL, KUBECONFIG_POLL_TIMEOUT, READY, RESOURCE_READY_INTERVAL,
    RESOURCE_READY_TIMEOUT, TRUE,
};
use crate::error::{self, BoxedError, Result};
use crate::wait::{self, CheckResult, CheckResultExt, PollSpec};
use k8s_openapi::api::core::v1::Pod;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use snafu::ResultExt;
use std::path::Path;
use std::sync::Mutex;

/// The `items` of a list returned by `get ... -o json`.
#[derive(Debug, Deserialize)]
pub(crate) struct ItemList<T> {
    #[serde(default = "Vec::new")]
    pub(crate) items: Vec<T>,
}

/// `true` when any init or regular container of `pod` is waiting, e.g. in `CrashLoopBackOff` or
/// `ContainerCreating`.
pub(crate) fn has_waiting_container(pod: &Pod) -> bool {
    let status = match &pod.status {
        Some(status) => status,
        None => return false,
    };
    status
        .init_container_statuses
        .iter()
        .chain(status.container_statuses.iter())
        .flatten()
        .any(|c| c.state.as_ref().and_then(|s| s.waiting.as_ref()).is_some())
}

/// A `status.conditions` entry as written by operators and cert-manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub status: String,
    pub reason: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConditionStatus {
    #[serde(default)]
    conditions: Vec<Condition>,
}

#[derive(Debug, Default, Deserialize)]
struct WithConditions {
    status: Option<ConditionStatus>,
}

fn with_namespace<'a>(mut args: Vec<&'a str>, namespace: Option<&'a str>) -> Vec<&'a str> {
    if let Some(namespace) = namespace {
        args.push("-n");
        args.push(namespace);
    }
    args
}

/// `get <args>`, returning the trimmed output.
pub async fn get_resource(session: &Session, args: &[&str]) -> Result<String> {
    session.run("get").args(args.iter().copied()).output().await
}

/// `get <args> -o json`, parsed as a list of `T`.
pub(crate) async fn get_list<T: DeserializeOwned>(session: &Session, args: &[&str]) -> Result<Vec<T>> {
    let json = session
        .run("get")
        .args(args.iter().copied())
        .args(["-o", "json"])
        .output()
        .await?;
    let list: ItemList<T> = serde_json::from_str(&json).context(error::JsonParseSnafu {
        what: format!("list of {}", args.join(" ")),
    })?;
    Ok(list.items)
}

async fn non_empty(session: &Session, args: &[&str]) -> std::result::Result<String, BoxedError> {
    let output = get_resource(session, args).await?;
    if output.is_empty() {
        return Err("empty output".into());
    }
    Ok(output)
}

/// Retries `get <args>` until it succeeds with non-empty output.
pub async fn get_resource_to_be_ready(session: &Session, args: &[&str]) -> Result<String> {
    let spec = PollSpec::new(RESOURCE_READY_INTERVAL, RESOURCE_READY_TIMEOUT)?;
    let what = format!("'{}' to be retrievable", args.join(" "));
    let output = wait::eventually(spec, &what, || non_empty(session, args)).await?;
    info!("The resource returned:\n{}", output);
    Ok(output)
}

/// The conditions of object `kind/name`.
pub async fn get_conditions(
    session: &Session,
    namespace: Option<&str>,
    kind: &str,
    name: &str,
) -> Result<Vec<Condition>> {
    let args = with_namespace(vec![kind, name, "-o", "json"], namespace);
    let json = session.run("get").args(args).output().await?;
    let object: WithConditions = serde_json::from_str(&json).context(error::JsonParseSnafu {
        what: format!("{} {}", kind, name),
    })?;
    Ok(object.status.map(|s| s.conditions).unwrap_or_default())
}

async fn is_ready(session: &Session, namespace: Option<&str>, kind: &str, name: &str) -> CheckResult {
    let conditions = get_conditions(session, namespace, kind, name)
        .await
        .transient()?;
    Ok(conditions
        .iter()
        .any(|c| c.type_ == READY && c.status == TRUE))
}

/// Waits for `kind/name` to report `Ready=True`, e.g. a cert-manager `Certificate` or `Issuer`.
pub async fn wait_for_resource_readiness(
    session: &Session,
    namespace: Option<&str>,
    kind: &str,
    name: &str,
    spec: PollSpec,
) -> Result<()> {
    let admin = session.as_admin().without_namespace();
    let what = format!("{} {} to become ready", kind, name);
    wait::poll(spec, &what, || is_ready(&admin, namespace, kind, name)).await?;
    Ok(())
}

/// Names of the pods in `namespace` matching `label`.
pub async fn pods_with_label(session: &Session, namespace: &str, label: &str) -> Result<Vec<String>> {
    let names = session
        .as_admin()
        .without_namespace()
        .run("get")
        .args([
            "pods",
            "-n",
            namespace,
            "-l",
            label,
            "-o=jsonpath={.items[*].metadata.name}",
        ])
        .output()
        .await?;
    Ok(names.split_whitespace().map(String::from).collect())
}

async fn replaced(session: &Session, namespace: &str, label: &str, old_pods: &[String]) -> CheckResult {
    let pods = pods_with_label(session, namespace, label).await.transient()?;
    if let Some(old) = pods.iter().find(|p| old_pods.contains(p)) {
        return wait::mismatch(format!("pod {} is still present", old));
    }
    info!("All pods are redeployed: {:?}", pods);
    Ok(true)
}

/// Waits until none of `old_pods` is among the pods matching `label`.
pub async fn wait_for_pods_redeployed(
    session: &Session,
    namespace: &str,
    label: &str,
    old_pods: &[String],
    spec: PollSpec,
) -> Result<()> {
    let what = format!("pods with label '{}' in {} to be redeployed", label, namespace);
    wait::poll(spec, &what, || replaced(session, namespace, label, old_pods)).await?;
    Ok(())
}

/// Logs `kind/name` for debugging, e.g. with `parameter` set to `-o=yaml`.
pub async fn dump_resource(
    session: &Session,
    namespace: Option<&str>,
    kind: &str,
    name: &str,
    parameter: &str,
) {
    let args = with_namespace(vec![kind, name, parameter], namespace);
    match session
        .as_admin()
        .without_namespace()
        .run("get")
        .args(args)
        .outcome()
        .await
    {
        Ok(output) => info!(
            "Dumping {} '{}' with '{}':\n{}{}",
            kind, name, parameter, output.stdout, output.stderr
        ),
        Err(e) => info!("Unable to dump {} '{}': {}", kind, name, e),
    }
}

async fn fetch_with(
    session: &Session,
    args: &[&str],
    wait_for_error: bool,
    slot: &Mutex<String>,
) -> CheckResult {
    let result = get_resource(session, args).await;
    let output = if wait_for_error {
        result.transient()?
    } else {
        result.fatal()?
    };
    if let Ok(mut guard) = slot.lock() {
        *guard = output;
    }
    Ok(true)
}

/// Runs `get <args>` with another kubeconfig, e.g. one minted for a test user. With
/// `wait_for_error` set a failing command is retried; without it the first failure is returned.
pub async fn get_with_kubeconfig(
    session: &Session,
    kubeconfig: &Path,
    wait_for_error: bool,
    args: &[&str],
) -> Result<String> {
    let spec = PollSpec::new(KUBECONFIG_POLL_INTERVAL, KUBECONFIG_POLL_TIMEOUT)?;
    let scoped = session.without_namespace().using_kubeconfig(kubeconfig);
    let what = format!(
        "'{}' to succeed with {}",
        args.join(" "),
        kubeconfig.display()
    );
    let slot = Mutex::new(String::new());
    wait::poll(spec, &what, || fetch_with(&scoped, args, wait_for_error, &slot)).await?;
    let output = slot.into_inner().unwrap_or_default();
    debug!("'{}' returned:\n{}", what, output);
    Ok(output)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use crate::testing::ScriptedExecutor;
    use crate::wait::secs;

    #[tokio::test(start_paused = true)]
    async fn retries_until_output() {
        let executor = ScriptedExecutor::new();
        executor.on(
            &["get", "route", "console"],
            vec![
                ScriptedExecutor::failure("NotFound"),
                ScriptedExecutor::stdout(""),
                ScriptedExecutor::stdout("console-openshift-console.apps.example.com"),
            ],
        );
        let session = Session::new(executor.clone());
        let host = get_resource_to_be_ready(
            &session,
            &["route", "console", "-o=jsonpath={.spec.host}"],
        )
        .await
        .unwrap();
        assert_eq!(host, "console-openshift-console.apps.example.com");
        assert_eq!(executor.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn certificate_becomes_ready() {
        let not_ready = r#"{"kind":"Certificate","status":{"conditions":[
            {"type":"Ready","status":"False","reason":"Issuing"}]}}"#;
        let ready = r#"{"kind":"Certificate","status":{"conditions":[
            {"type":"Issuing","status":"False"},
            {"type":"Ready","status":"True","reason":"Ready"}]}}"#;
        let executor = ScriptedExecutor::new();
        executor.on(
            &["get", "certificate", "cert-from-selfsigned", "-n e2e"],
            vec![
                ScriptedExecutor::stdout("{}"),
                ScriptedExecutor::stdout(not_ready),
                ScriptedExecutor::stdout(ready),
            ],
        );
        let session = Session::new(executor.clone());
        wait_for_resource_readiness(
            &session,
            Some("e2e"),
            "certificate",
            "cert-from-selfsigned",
            secs(10, 300).unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(executor.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn redeployed_when_old_pods_are_gone() {
        let executor = ScriptedExecutor::new();
        executor.on(
            &["get", "pods", "app=cert-manager"],
            vec![
                ScriptedExecutor::stdout("cm-a cm-b"),
                ScriptedExecutor::stdout("cm-b cm-c"),
                ScriptedExecutor::stdout("cm-c cm-d"),
            ],
        );
        let session = Session::new(executor.clone());
        let old = pods_with_label(&session, "cert-manager", "app=cert-manager")
            .await
            .unwrap();
        wait_for_pods_redeployed(
            &session,
            "cert-manager",
            "app=cert-manager",
            &old,
            secs(10, 120).unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(executor.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn kubeconfig_failure_is_fatal_unless_waiting_for_it() {
        let executor = ScriptedExecutor::new();
        executor.on(
            &["--kubeconfig=/tmp/user1", "get", "pods"],
            vec![
                ScriptedExecutor::failure("Unauthorized"),
                ScriptedExecutor::stdout("pod-a"),
            ],
        );
        let session = Session::new(executor.clone())
            .with_kubeconfig("/tmp/admin")
            .with_namespace("e2e");

        let err = get_with_kubeconfig(&session, Path::new("/tmp/user1"), false, &["pods"])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Aborted { .. }), "{}", err);

        let output = get_with_kubeconfig(&session, Path::new("/tmp/user1"), true, &["pods"])
            .await
            .unwrap();
        assert_eq!(output, "pod-a");
        assert!(!executor.calls()[0].to_string().contains("--namespace"));
    }

    #[tokio::test]
    async fn lists_parse_with_and_without_items() {
        let executor = ScriptedExecutor::new();
        executor.on(
            &["get", "pods", "-n", "empty"],
            vec![ScriptedExecutor::stdout(r#"{"apiVersion":"v1","kind":"List"}"#)],
        );
        executor.on(
            &["get", "pods", "-n", "busy"],
            vec![ScriptedExecutor::stdout(
                r#"{"apiVersion":"v1","kind":"List","items":[{"apiVersion":"v1","kind":"Pod","metadata":{"name":"web-1"}}]}"#,
            )],
        );
        let session = Session::new(executor);
        let empty: Vec<Pod> = get_list(&session, &["pods", "-n", "empty"]).await.unwrap();
        assert!(empty.is_empty());
        let busy: Vec<Pod> = get_list(&session, &["pods", "-n", "busy"]).await.unwrap();
        assert_eq!(busy[0].metadata.name.as_deref(), Some("web-1"));
    }

    #[test]
    fn waiting_containers() {
        let pod = |init: serde_json::Value, main: serde_json::Value| -> Pod {
            serde_json::from_value(serde_json::json!({
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": {"name": "web-1"},
                "status": {
                    "phase": "Running",
                    "initContainerStatuses": [init],
                    "containerStatuses": [main]
                }
            }))
            .unwrap()
        };
        let container = |state: serde_json::Value| {
            serde_json::json!({
                "name": "web",
                "image": "web",
                "imageID": "",
                "ready": false,
                "restartCount": 42,
                "state": state
            })
        };
        let running = serde_json::json!({"running": {}});
        let terminated = serde_json::json!({"terminated": {"exitCode": 0}});
        let crash_loop = serde_json::json!({"waiting": {"reason": "CrashLoopBackOff"}});

        assert!(!has_waiting_container(&pod(
            container(terminated.clone()),
            container(running.clone())
        )));
        assert!(has_waiting_container(&pod(
            container(terminated),
            container(crash_loop.clone())
        )));
        assert!(has_waiting_container(&pod(container(crash_loop), container(running))));
    }
}
