/*!

Verification of the TLS serving configuration (cipher suites and minimum TLS version) that the
API servers and the OAuth server actually run with.

Every source is reduced to the same canonical text, `["<cipher>",...] <minTLSVersion>`, and
compared with a [`CipherExpectation`] as an opaque string.

!*/

use crate::cli::Session;
use crate::constants::{
    AUTHENTICATION_NAMESPACE, CIPHER_POLL_INTERVAL, CIPHER_POLL_TIMEOUT, CLICONFIG,
    HOSTED_KAS_CONFIG, HOSTED_KAS_CONFIG_KEY, HOSTED_OAS_CONFIG, HOSTED_OAUTH_CONFIG,
    HOSTED_YAML_CONFIG_KEY, KUBE_APISERVER_OPERATOR_RESOURCE,
    OPENSHIFT_APISERVER_OPERATOR_RESOURCE, SERVING_INFO_JSONPATH,
};
use crate::error::{self, Result};
use crate::wait::{self, CheckResult, CheckResultExt, PollSpec};
use k8s_openapi::api::core::v1::ConfigMap;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{OptionExt, ResultExt};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The expected serving configuration in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CipherExpectation(String);

impl CipherExpectation {
    /// Takes an already canonical string such as
    /// `["TLS_AES_128_GCM_SHA256","TLS_AES_256_GCM_SHA384"] VersionTLS13`.
    pub fn new<S: Into<String>>(canonical: S) -> Self {
        Self(canonical.into().trim().to_string())
    }

    pub fn from_parts<I, S>(cipher_suites: I, min_tls_version: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let suites: Vec<String> = cipher_suites.into_iter().map(Into::into).collect();
        Self(format!("{} {}", Value::from(suites), min_tls_version))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CipherExpectation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CipherExpectation {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

/// The `servingInfo` stanza of an API server or OAuth server configuration. A field the
/// configuration leaves out renders as `null` in the canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServingInfo {
    #[serde(rename = "cipherSuites")]
    pub cipher_suites: Option<Vec<String>>,
    #[serde(rename = "minTLSVersion")]
    pub min_tls_version: Option<String>,
}

impl ServingInfo {
    pub fn to_expectation(&self) -> CipherExpectation {
        CipherExpectation(format!(
            "{} {}",
            Value::from(self.cipher_suites.clone()),
            self.min_tls_version.as_deref().unwrap_or("null")
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServingConfig {
    serving_info: Option<ServingInfo>,
}

/// How a configuration document is embedded in a config map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Embedded {
    Json,
    Yaml,
}

impl Embedded {
    pub(crate) fn serving_info(self, what: &str, text: &str) -> Result<ServingInfo> {
        let config: ServingConfig = match self {
            Embedded::Json => {
                serde_json::from_str(text).context(error::JsonParseSnafu { what })?
            }
            Embedded::Yaml => {
                serde_yaml::from_str(text).context(error::YamlParseSnafu { what })?
            }
        };
        Ok(config.serving_info.unwrap_or_default())
    }
}

pub(crate) async fn read_config_map(
    session: &Session,
    namespace: &str,
    name: &str,
) -> Result<ConfigMap> {
    let json = session
        .as_admin()
        .without_namespace()
        .run("get")
        .args(["cm", name, "-n", namespace, "-o", "json"])
        .output()
        .await?;
    serde_json::from_str(&json).context(error::JsonParseSnafu {
        what: format!("config map {}/{}", namespace, name),
    })
}

pub(crate) fn config_map_entry<'a>(config_map: &'a ConfigMap, key: &str) -> Result<&'a str> {
    config_map
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(String::as_str)
        .context(error::MissingSnafu {
            what: key,
            from: format!(
                "config map {}",
                config_map.metadata.name.as_deref().unwrap_or_default()
            ),
        })
}

pub(crate) async fn embedded_serving_info(
    session: &Session,
    namespace: &str,
    name: &str,
    key: &str,
    format: Embedded,
) -> Result<CipherExpectation> {
    let config_map = read_config_map(session, namespace, name).await?;
    let text = config_map_entry(&config_map, key)?;
    Ok(format
        .serving_info(&format!("{}/{}[{}]", namespace, name, key), text)?
        .to_expectation())
}

/// Where the serving configuration of a standalone cluster component is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigSource {
    /// The OAuth server's `v4-0-config-system-cliconfig` config map.
    #[serde(rename = "authentication")]
    AuthenticationOperator,
    /// The observed config of `openshiftapiservers.operator/cluster`.
    #[serde(rename = "openshift-apiserver")]
    OpenShiftApiServerOperator,
    /// The observed config of `kubeapiservers.operator/cluster`.
    #[serde(rename = "kube-apiserver")]
    KubeApiServerOperator,
}

serde_plain::derive_display_from_serialize!(ConfigSource);

impl FromStr for ConfigSource {
    type Err = error::Error;

    fn from_str(s: &str) -> Result<Self> {
        serde_plain::from_str(s).context(error::ParseNameSnafu {
            what: "config source",
            value: s,
        })
    }
}

impl ConfigSource {
    pub const ALL: [ConfigSource; 3] = [
        ConfigSource::AuthenticationOperator,
        ConfigSource::OpenShiftApiServerOperator,
        ConfigSource::KubeApiServerOperator,
    ];

    /// Reads the serving configuration currently in effect for this source.
    pub async fn observe(self, session: &Session) -> Result<CipherExpectation> {
        let operator_resource = match self {
            ConfigSource::AuthenticationOperator => {
                return embedded_serving_info(
                    session,
                    AUTHENTICATION_NAMESPACE,
                    CLICONFIG,
                    CLICONFIG,
                    Embedded::Json,
                )
                .await
            }
            ConfigSource::OpenShiftApiServerOperator => OPENSHIFT_APISERVER_OPERATOR_RESOURCE,
            ConfigSource::KubeApiServerOperator => KUBE_APISERVER_OPERATOR_RESOURCE,
        };
        let projected = session
            .as_admin()
            .without_namespace()
            .run("get")
            .args([operator_resource, "cluster", SERVING_INFO_JSONPATH])
            .output()
            .await?;
        Ok(CipherExpectation::new(projected))
    }
}

/// A component of a hosted control plane whose serving configuration lives in a config map in
/// the control plane namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostedComponent {
    #[serde(rename = "kube-apiserver")]
    KubeApiServer,
    #[serde(rename = "openshift-apiserver")]
    OpenShiftApiServer,
    #[serde(rename = "oauth-openshift")]
    OAuthServer,
}

serde_plain::derive_display_from_serialize!(HostedComponent);

impl HostedComponent {
    pub const ALL: [HostedComponent; 3] = [
        HostedComponent::KubeApiServer,
        HostedComponent::OpenShiftApiServer,
        HostedComponent::OAuthServer,
    ];

    pub fn config_map(self) -> &'static str {
        match self {
            HostedComponent::KubeApiServer => HOSTED_KAS_CONFIG,
            HostedComponent::OpenShiftApiServer => HOSTED_OAS_CONFIG,
            HostedComponent::OAuthServer => HOSTED_OAUTH_CONFIG,
        }
    }

    pub fn data_key(self) -> &'static str {
        match self {
            HostedComponent::KubeApiServer => HOSTED_KAS_CONFIG_KEY,
            HostedComponent::OpenShiftApiServer | HostedComponent::OAuthServer => {
                HOSTED_YAML_CONFIG_KEY
            }
        }
    }

    fn format(self) -> Embedded {
        match self {
            HostedComponent::KubeApiServer => Embedded::Json,
            HostedComponent::OpenShiftApiServer | HostedComponent::OAuthServer => Embedded::Yaml,
        }
    }

    /// Reads the serving configuration from the component's config map in `namespace`.
    pub async fn observe(self, session: &Session, namespace: &str) -> Result<CipherExpectation> {
        embedded_serving_info(
            session,
            namespace,
            self.config_map(),
            self.data_key(),
            self.format(),
        )
        .await
    }
}

pub(crate) fn compare<N: Display>(
    name: N,
    expected: &CipherExpectation,
    actual: &CipherExpectation,
) -> CheckResult {
    info!("Comparing the ciphers of {}: {} with {}", name, expected, actual);
    if actual != expected {
        return wait::mismatch(format!("{} serves {}", name, actual));
    }
    info!("Ciphers of {} are matched", name);
    Ok(true)
}

async fn source_matches(
    session: &Session,
    expected: &CipherExpectation,
    source: ConfigSource,
) -> CheckResult {
    let actual = source.observe(session).await.transient()?;
    compare(source, expected, &actual)
}

pub(crate) fn cipher_poll_spec() -> Result<PollSpec> {
    PollSpec::new(CIPHER_POLL_INTERVAL, CIPHER_POLL_TIMEOUT)
}

/// Waits for `source` to serve `expected`.
pub async fn verify_ciphers(
    session: &Session,
    expected: &CipherExpectation,
    source: ConfigSource,
) -> Result<()> {
    let what = format!("{} ciphers to become {}", source, expected);
    wait::poll(cipher_poll_spec()?, &what, || {
        source_matches(session, expected, source)
    })
    .await?;
    Ok(())
}

/// [`verify_ciphers`] for every [`ConfigSource`] in turn, stopping at the first failure.
pub async fn verify_all_ciphers(session: &Session, expected: &CipherExpectation) -> Result<()> {
    for source in ConfigSource::ALL {
        verify_ciphers(session, expected, source).await?;
    }
    Ok(())
}
