use crate::status::StatusMap;
use snafu::Snafu;
use std::path::PathBuf;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// A boxed error carried by fatal poll conditions.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type for the harness.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Stopped waiting for {}: {}", what, source))]
    Aborted { what: String, source: BoxedError },

    #[snafu(display(
        "'{}' failed with exit status '{}'\n\n{}\n\n{}",
        command,
        code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()),
        stdout,
        stderr
    ))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[snafu(display("Cluster {} health check failed: {}", area, source))]
    HealthCheck {
        area: String,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    #[snafu(display("Unable to {}: {}", action, source))]
    Io {
        action: String,
        source: std::io::Error,
    },

    #[snafu(display(
        "Invalid poll parameters: interval {:?} must be non-zero and not exceed timeout {:?}",
        interval,
        timeout
    ))]
    InvalidPollSpec {
        interval: Duration,
        timeout: Duration,
    },

    #[snafu(display("Unable to parse {} as json: {}", what, source))]
    JsonParse {
        what: String,
        source: serde_json::Error,
    },

    #[snafu(display("Missing '{}' in {}", what, from))]
    Missing { what: String, from: String },

    #[snafu(display(
        "{} operator went from {} to {} after {} (step {})",
        operator,
        StatusMap::healthy(),
        actual,
        msg,
        step
    ))]
    OperatorRegressed {
        operator: String,
        step: String,
        msg: String,
        actual: StatusMap,
    },

    #[snafu(display("Unable to parse '{}' as {}: {}", value, what, source))]
    ParseInt {
        what: String,
        value: String,
        source: std::num::ParseIntError,
    },

    #[snafu(display("Unable to parse '{}' as {}: {}", value, what, source))]
    ParseName {
        what: String,
        value: String,
        source: serde_plain::Error,
    },

    #[snafu(display("Unable to spawn '{}': {}", program.display(), source))]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Cluster sanity check failed: {}", failures.join("; ")))]
    SanityCheck { failures: Vec<String> },

    #[snafu(display("Invalid status condition '{}', expected 'Type=Value'", entry))]
    StatusEntry { entry: String },

    #[snafu(display(
        "Wrong {} operator status reported, expected {} but found {}",
        operator,
        expected,
        actual
    ))]
    StatusMismatch {
        operator: String,
        expected: StatusMap,
        actual: StatusMap,
    },

    #[snafu(display(
        "Timed out after {:?} and {} attempts waiting for {}{}",
        timeout,
        attempts,
        what,
        last.as_ref().map(|l| format!(", last observed: {}", l)).unwrap_or_default()
    ))]
    Timeout {
        what: String,
        timeout: Duration,
        attempts: u32,
        last: Option<String>,
    },

    #[snafu(display("Unknown encryption key secret '{}'", secret))]
    UnknownEncryptionSecret { secret: String },

    #[snafu(display("Unable to parse {} as yaml: {}", what, source))]
    YamlParse {
        what: String,
        source: serde_yaml::Error,
    },
}

impl Error {
    /// Returns `true` if this error means a poll ran out of time, as opposed to being aborted by
    /// its condition or failing outright.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}
