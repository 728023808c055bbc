#![cfg(feature = "integ")]
use model::{
    observed_generation, patch_hosted_cluster, verify_hosted_ciphers, wait_control_plane_restart,
    CipherExpectation, HostedCluster, Session,
};
use selftest::Cluster;

const INTERMEDIATE: &str = r#"["TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256","TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256","TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384","TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384","TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256","TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256"] VersionTLS12"#;
const CUSTOM: &str = r#"["TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256","TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256","TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256","TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256"] VersionTLS11"#;
const CUSTOM_PATCH: &str = r#"{"spec": {"configuration": {"apiServer": {"tlsSecurityProfile":{"custom":{"ciphers":["ECDHE-ECDSA-CHACHA20-POLY1305","ECDHE-RSA-CHACHA20-POLY1305","ECDHE-RSA-AES128-GCM-SHA256","ECDHE-ECDSA-AES128-GCM-SHA256"],"minTLSVersion":"VersionTLS11"},"type":"Custom"}}}}}"#;
const DEFAULT_PATCH: &str = r#"{"spec": {"configuration": {"apiServer": null}}}"#;

async fn patch_and_verify(
    session: &Session,
    hosted: &HostedCluster,
    patch: &str,
    expected: &str,
) -> model::Result<()> {
    let generation = observed_generation(session, hosted).await?;
    patch_hosted_cluster(session, hosted, patch).await?;
    wait_control_plane_restart(session, hosted).await?;
    verify_hosted_ciphers(
        session,
        hosted,
        &CipherExpectation::new(expected),
        Some(generation),
    )
    .await
}

#[tokio::test]
async fn hosted_cipher_profile_is_wired_through() {
    let cluster = Cluster::from_env().unwrap();
    let hosted = match cluster.hosted() {
        Some(hosted) => hosted.clone(),
        None => {
            eprintln!("E2E_HOSTED_CLUSTER_NAME is not set, skipping");
            return;
        }
    };
    let session = cluster.session();
    verify_hosted_ciphers(session, &hosted, &CipherExpectation::new(INTERMEDIATE), None)
        .await
        .unwrap();

    let changed = patch_and_verify(session, &hosted, CUSTOM_PATCH, CUSTOM).await;
    let restored = patch_and_verify(session, &hosted, DEFAULT_PATCH, INTERMEDIATE).await;
    changed.unwrap();
    restored.unwrap();
}

#[tokio::test]
async fn guest_kubeconfig_reaches_hosted_cluster() {
    let cluster = Cluster::from_env().unwrap();
    if cluster.hosted().is_none() {
        eprintln!("E2E_HOSTED_CLUSTER_NAME is not set, skipping");
        return;
    }
    let guest = cluster.guest_session().await.unwrap().as_guest();
    let nodes = model::get_resource(&guest.without_namespace(), &["nodes"])
        .await
        .unwrap();
    assert!(!nodes.is_empty());
}
