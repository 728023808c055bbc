use crate::cli::Session;
use crate::constants::{WEBHOOK_POLL_INTERVAL, WEBHOOK_POLL_TIMEOUT};
use crate::error::Result;
use crate::resource::{get_conditions, get_resource, Condition};
use crate::wait::{self, CheckResult, CheckResultExt, PollSpec};
use log::{info, warn};

fn mentions_any(condition: &Condition, reasons: &[&str]) -> bool {
    let reason = condition.reason.as_deref().unwrap_or_default();
    let message = condition.message.as_deref().unwrap_or_default();
    reasons
        .iter()
        .any(|r| reason.contains(r) || message.contains(r))
}

async fn condition_reported(
    session: &Session,
    condition_type: &str,
    reasons: &[&str],
    expected_status: &str,
) -> CheckResult {
    let conditions = get_conditions(session, None, "kubeapiserver", "cluster")
        .await
        .transient()?;
    let condition = match conditions.iter().find(|c| c.type_ == condition_type) {
        Some(condition) => condition,
        None => return wait::mismatch(format!("no {} condition", condition_type)),
    };
    if condition.status != expected_status || !mentions_any(condition, reasons) {
        return wait::mismatch(format!(
            "{} is {} ({})",
            condition_type,
            condition.status,
            condition.message.as_deref().unwrap_or_default()
        ));
    }
    info!(
        "kube-apiserver reports admission webhook condition {}={}: {}",
        condition_type,
        condition.status,
        condition.message.as_deref().unwrap_or_default()
    );
    Ok(true)
}

/// Waits for `kubeapiserver/cluster` to report each of `condition_types` with `expected_status`
/// and a reason or message mentioning one of `reasons`. On failure the validating webhook
/// configurations are logged.
pub async fn compare_webhook_conditions(
    session: &Session,
    reasons: &[&str],
    expected_status: &str,
    condition_types: &[&str],
) -> Result<()> {
    let admin = session.as_admin().without_namespace();
    let spec = PollSpec::new(WEBHOOK_POLL_INTERVAL, WEBHOOK_POLL_TIMEOUT)?;
    for condition_type in condition_types {
        let what = format!(
            "admission webhook condition {}={} mentioning one of {:?}",
            condition_type, expected_status, reasons
        );
        let result = wait::poll(spec, &what, || {
            condition_reported(&admin, condition_type, reasons, expected_status)
        })
        .await;
        if let Err(e) = result {
            match get_resource(&admin, &["validatingwebhookconfigurations"]).await {
                Ok(listing) => warn!("Validating webhook configurations:\n{}", listing),
                Err(list_error) => warn!("Unable to list webhook configurations: {}", list_error),
            }
            return Err(e);
        }
    }
    Ok(())
}
