use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Test settings provides a way to send arguments into the scenario tests using environment
/// variables.
pub(super) struct TestSettings {}

impl TestSettings {
    /// The path or name of the `oc` binary.
    pub(super) fn oc_path() -> &'static Path {
        TEST_SETTINGS.oc_path.as_path()
    }

    pub(super) fn kubeconfig() -> Option<&'static Path> {
        TEST_SETTINGS.kubeconfig.as_deref()
    }

    pub(super) fn admin_kubeconfig() -> Option<&'static Path> {
        TEST_SETTINGS.admin_kubeconfig.as_deref()
    }

    pub(super) fn guest_kubeconfig() -> Option<&'static Path> {
        TEST_SETTINGS.guest_kubeconfig.as_deref()
    }

    pub(super) fn hosted_cluster_name() -> Option<&'static str> {
        TEST_SETTINGS.hosted_cluster_name.as_deref()
    }

    pub(super) fn hosted_cluster_namespace() -> &'static str {
        TEST_SETTINGS.hosted_cluster_namespace.as_str()
    }

    pub(super) fn testdata_dir() -> PathBuf {
        TEST_SETTINGS
            .testdata_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata"))
    }
}

#[derive(Debug, Deserialize)]
struct Inner {
    /// The path to the `oc` binary. Defaults to `oc` (i.e. by default the binary is expected to
    /// be found via `$PATH`).
    ///
    /// # Example
    ///
    /// ```text
    /// E2E_OC_PATH=/wherever/oc
    /// ```
    #[serde(default = "oc")]
    oc_path: PathBuf,
    /// Kubeconfig of the regular test user. `oc` picks its own default when unset.
    kubeconfig: Option<PathBuf>,
    /// Kubeconfig with cluster-admin rights, used for cluster scoped reads and patches.
    admin_kubeconfig: Option<PathBuf>,
    /// Kubeconfig of a hosted (guest) cluster. Extracted from the management cluster when unset.
    guest_kubeconfig: Option<PathBuf>,
    /// Name of the `HostedCluster` object. Hosted scenarios are skipped without it.
    hosted_cluster_name: Option<String>,
    #[serde(default = "clusters")]
    hosted_cluster_namespace: String,
    /// Directory with the manifest templates. Defaults to this crate's `testdata`.
    testdata_dir: Option<PathBuf>,
}

lazy_static::lazy_static! {
    static ref TEST_SETTINGS: Inner =
        envy::prefixed("E2E_")
            .from_env::<Inner>()
            .expect("Error parsing TestSettings environment variables");
}

/// We need these to provide defaults for serde.
fn oc() -> PathBuf {
    PathBuf::from(model::cli::DEFAULT_CLI)
}

fn clusters() -> String {
    String::from("clusters")
}
