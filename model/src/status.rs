/*!

Cluster operator condition checks.

A [`StatusMap`] is the set of conditions a scenario expects an operator to report, compared
structurally with what the operator actually reports. Waiting for the healthy baseline is guarded by
a cooldown re-check because operators are known to flap back to `Progressing=True` shortly after
settling.

!*/

use crate::cli::Session;
use crate::constants::{
    AVAILABLE, CO_POLL_INTERVAL, CO_STABLE_DELAY, DEGRADED, FALSE, KAS_SETTLE_DELAY,
    KUBE_APISERVER_OPERATOR, MASTER_ROLE_LABEL, PROGRESSING, SINGLE_NODE_WAIT_FACTOR, TRUE,
    WORKER_ROLE_LABEL,
};
use crate::error::{self, Result};
use crate::wait::{self, CheckResult, PollSpec};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use snafu::{ensure, OptionExt};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::sleep;

/// Condition type to condition status, e.g. `Available -> True`. Equality is structural: the same
/// keys with the same values, order irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusMap(BTreeMap<String, String>);

impl StatusMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{Available: True, Progressing: False, Degraded: False}`
    pub fn healthy() -> Self {
        [(AVAILABLE, TRUE), (PROGRESSING, FALSE), (DEGRADED, FALSE)]
            .into_iter()
            .collect()
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, condition: K, status: V) -> Self {
        self.insert(condition, status);
        self
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, condition: K, status: V) {
        self.0.insert(condition.into(), status.into());
    }

    pub fn get(&self, condition: &str) -> Option<&str> {
        self.0.get(condition).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_healthy_baseline(&self) -> bool {
        *self == Self::healthy()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StatusMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Parses `Available=True,Progressing=False`.
impl FromStr for StatusMap {
    type Err = error::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut map = StatusMap::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (condition, status) = entry
                .split_once('=')
                .context(error::StatusEntrySnafu { entry })?;
            let (condition, status) = (condition.trim(), status.trim());
            ensure!(
                !condition.is_empty() && !status.is_empty(),
                error::StatusEntrySnafu { entry }
            );
            map.insert(condition, status);
        }
        Ok(map)
    }
}

impl Display for StatusMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (condition, status)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", condition, status)?;
        }
        write!(f, "}}")
    }
}

/// Reads the status of each condition named in `expected` from cluster operator `operator`. A
/// condition that cannot be read is reported with an empty status.
pub async fn get_co_status(session: &Session, operator: &str, expected: &StatusMap) -> StatusMap {
    let admin = session.as_admin().without_namespace();
    let mut actual = StatusMap::new();
    for condition in expected.keys() {
        let jsonpath = format!(
            "-o=jsonpath={{.status.conditions[?(.type == '{}')].status}}",
            condition
        );
        let status = match admin
            .run("get")
            .args(["co", operator, jsonpath.as_str()])
            .output()
            .await
        {
            Ok(status) => status,
            Err(e) => {
                debug!(
                    "Unable to read condition '{}' of operator '{}': {}",
                    condition, operator, e
                );
                String::new()
            }
        };
        actual.insert(condition, status);
    }
    actual
}

/// Compares the operator's conditions with `expected` once.
pub async fn check_co_status(session: &Session, operator: &str, expected: &StatusMap) -> Result<()> {
    let actual = get_co_status(session, operator, expected).await;
    ensure!(
        actual == *expected,
        error::StatusMismatchSnafu {
            operator,
            expected: expected.clone(),
            actual,
        }
    );
    Ok(())
}

/// Poll cadence for operator waits, plus the cooldown used to confirm the healthy baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityPolicy {
    spec: PollSpec,
    cooldown: Duration,
}

impl StabilityPolicy {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            spec: PollSpec::new(CO_POLL_INTERVAL, timeout)?,
            cooldown: CO_STABLE_DELAY,
        })
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.spec.timeout()
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

async fn observe_stable(
    session: &Session,
    operator: &str,
    expected: &StatusMap,
    cooldown: Duration,
) -> CheckResult {
    let actual = get_co_status(session, operator, expected).await;
    if actual != *expected {
        return wait::mismatch(format!("operator {} reports {}", operator, actual));
    }
    if !expected.is_healthy_baseline() {
        return Ok(true);
    }

    info!(
        "Operator {} reports {}, re-checking in {:?}",
        operator, actual, cooldown
    );
    sleep(cooldown).await;
    let confirmed = get_co_status(session, operator, expected).await;
    if confirmed != *expected {
        warn!(
            "Operator {} flapped to {} during cooldown",
            operator, confirmed
        );
        return Ok(false);
    }
    Ok(true)
}

/// Waits for `operator` to report exactly `expected`. When `expected` is the healthy baseline a
/// match only counts if it still holds after the policy's cooldown.
pub async fn wait_co_status(
    session: &Session,
    operator: &str,
    expected: &StatusMap,
    policy: &StabilityPolicy,
) -> Result<()> {
    let what = format!("operator {} to become {}", operator, expected);
    let cooldown = policy.cooldown;
    wait::poll(policy.spec, &what, move || {
        observe_stable(session, operator, expected, cooldown)
    })
    .await?;
    info!("Operator {} is {}", operator, expected);
    Ok(())
}

/// Saturates instead of overflowing for huge budgets.
fn single_node_budget(base_wait: Duration) -> Duration {
    base_wait
        .checked_mul(SINGLE_NODE_WAIT_FACTOR)
        .unwrap_or(Duration::MAX)
}

/// Waits up to `base_wait` (three times as long on a single node cluster) for `operator` to
/// report `expected`.
pub async fn wait_co_becomes(
    session: &Session,
    operator: &str,
    base_wait: Duration,
    expected: &StatusMap,
) -> Result<()> {
    let mut budget = base_wait;
    if is_single_node(session).await {
        budget = single_node_budget(base_wait);
        info!("Single node cluster, waiting up to {:?}", budget);
    }
    let policy = StabilityPolicy::new(budget)?;
    let result = wait_co_status(session, operator, expected, &policy).await;
    if matches!(&result, Err(e) if e.is_timeout()) {
        match session
            .as_admin()
            .without_namespace()
            .run("get")
            .arg("co")
            .outcome()
            .await
        {
            Ok(output) => warn!("Cluster operators:\n{}{}", output.stdout, output.stderr),
            Err(e) => warn!("Unable to list cluster operators: {}", e),
        }
    }
    result
}

async fn node_names(session: &Session, role_label: &str) -> Result<Vec<String>> {
    let names = session
        .as_admin()
        .without_namespace()
        .run("get")
        .args([
            "nodes",
            "-l",
            role_label,
            "-o=jsonpath={.items[*].metadata.name}",
        ])
        .output()
        .await?;
    Ok(names.split_whitespace().map(String::from).collect())
}

/// `true` when the cluster has exactly one master and one worker and they are the same node.
pub async fn is_single_node(session: &Session) -> bool {
    let masters = node_names(session, MASTER_ROLE_LABEL).await;
    let workers = node_names(session, WORKER_ROLE_LABEL).await;
    match (masters, workers) {
        (Ok(masters), Ok(workers)) => masters.len() == 1 && masters == workers,
        (Err(e), _) | (_, Err(e)) => {
            debug!("Unable to list nodes by role: {}", e);
            false
        }
    }
}

/// Lets the kube-apiserver operator settle after `step`, then fails if it left the healthy
/// baseline it was in before the step.
pub async fn kas_operator_check_for_step(
    session: &Session,
    pre_status: &StatusMap,
    step: &str,
    msg: &str,
) -> Result<()> {
    sleep(KAS_SETTLE_DELAY).await;
    let post_status = get_co_status(session, KUBE_APISERVER_OPERATOR, &StatusMap::healthy()).await;
    info!(
        "Operator {} {} after {} (step {})",
        KUBE_APISERVER_OPERATOR, post_status, msg, step
    );
    ensure!(
        !(pre_status.is_healthy_baseline() && post_status != *pre_status),
        error::OperatorRegressedSnafu {
            operator: KUBE_APISERVER_OPERATOR,
            step,
            msg,
            actual: post_status,
        }
    );
    Ok(())
}
