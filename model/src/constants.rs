use std::time::Duration;

// Cluster operators
pub const AUTHENTICATION_OPERATOR: &str = "authentication";
pub const KUBE_APISERVER_OPERATOR: &str = "kube-apiserver";
pub const OPENSHIFT_APISERVER_OPERATOR: &str = "openshift-apiserver";

// Condition types and values
pub const AVAILABLE: &str = "Available";
pub const PROGRESSING: &str = "Progressing";
pub const DEGRADED: &str = "Degraded";
pub const READY: &str = "Ready";
pub const TRUE: &str = "True";
pub const FALSE: &str = "False";
pub const KAS_AVAILABLE_CONDITION: &str = "KubeAPIServerAvailable";

// Serving configuration locations
pub const AUTHENTICATION_NAMESPACE: &str = "openshift-authentication";
pub const CLICONFIG: &str = "v4-0-config-system-cliconfig";
pub const OPENSHIFT_APISERVER_OPERATOR_RESOURCE: &str = "openshiftapiservers.operator";
pub const KUBE_APISERVER_OPERATOR_RESOURCE: &str = "kubeapiservers.operator";
pub const HOSTED_KAS_CONFIG: &str = "kas-config";
pub const HOSTED_KAS_CONFIG_KEY: &str = "config.json";
pub const HOSTED_OAS_CONFIG: &str = "openshift-apiserver";
pub const HOSTED_OAUTH_CONFIG: &str = "oauth-openshift";
pub const HOSTED_YAML_CONFIG_KEY: &str = "config.yaml";
pub const SERVING_INFO_JSONPATH: &str =
    "-o=jsonpath={.spec.observedConfig.servingInfo['cipherSuites', 'minTLSVersion']}";

// Node roles
pub const MASTER_ROLE_LABEL: &str = "node-role.kubernetes.io/master";
pub const WORKER_ROLE_LABEL: &str = "node-role.kubernetes.io/worker";

// Encryption
pub const CONFIG_MANAGED_NAMESPACE: &str = "openshift-config-managed";

// Poll cadence and budgets
pub const CO_POLL_INTERVAL: Duration = Duration::from_secs(20);
pub const CO_STABLE_DELAY: Duration = Duration::from_secs(100);
pub const KAS_SETTLE_DELAY: Duration = Duration::from_secs(45);
pub const SINGLE_NODE_WAIT_FACTOR: u32 = 3;
pub const CIPHER_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const CIPHER_POLL_TIMEOUT: Duration = Duration::from_secs(60);
pub const RESOURCE_READY_INTERVAL: Duration = Duration::from_secs(6);
pub const RESOURCE_READY_TIMEOUT: Duration = Duration::from_secs(300);
pub const KUBECONFIG_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const KUBECONFIG_POLL_TIMEOUT: Duration = Duration::from_secs(120);
pub const WEBHOOK_POLL_INTERVAL: Duration = Duration::from_secs(20);
pub const WEBHOOK_POLL_TIMEOUT: Duration = Duration::from_secs(300);
pub const RESTART_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const RESTART_RECHECKS: u32 = 3;
pub const NODES_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const NODES_HEALTH_TIMEOUT: Duration = Duration::from_secs(600);
pub const OPERATORS_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const OPERATORS_HEALTH_TIMEOUT: Duration = Duration::from_secs(1500);
pub const PODS_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const PODS_HEALTH_TIMEOUT: Duration = Duration::from_secs(600);
pub const PROJECT_RETRY_INTERVAL: Duration = Duration::from_secs(3);
pub const PROJECT_RETRY_TIMEOUT: Duration = Duration::from_secs(9);
/// Hosted control plane apps (the `app` label of their pods) to wait for after the hosted cluster
/// is patched, in order, with how long each may take to roll out.
pub const HOSTED_RESTART_WAITS: [(&str, Duration); 3] = [
    ("kube-apiserver", Duration::from_secs(480)),
    ("openshift-apiserver", Duration::from_secs(180)),
    ("oauth-openshift", Duration::from_secs(120)),
];
pub const ENCRYPTION_POLL_INTERVAL: Duration = Duration::from_secs(60);
