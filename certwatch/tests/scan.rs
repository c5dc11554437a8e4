#![deny(rust_2018_idioms)]

mod support;

use certwatch::{report, scan, ScanError, Stage};
use support::*;

#[tokio::test]
async fn reports_a_self_signed_certificate() {
    let cluster = FakeCluster::default().with_namespace(
        "test-namespace",
        vec![tls_secret("test-namespace", "test-secret", &valid_for_days(365))],
    );

    let scan = scan::scan(&cluster).await.expect("scan must succeed");
    assert!(scan.failures.is_empty(), "{:?}", scan.failures);
    assert_eq!(scan.records.len(), 1);

    let record = &scan.records[0];
    assert_eq!(record.namespace, "test-namespace");
    assert_eq!(record.secret_name, "test-secret");
    assert_eq!(record.issuer, "CN=example.com");
    assert!(
        (364..=365).contains(&record.remaining_days),
        "unexpected remaining days: {}",
        record.remaining_days
    );

    let mut out = Vec::new();
    report::write_table(&mut out, &scan.records).expect("write table");
    let text = String::from_utf8(out).expect("utf8");
    let rows = text.lines().skip(1).collect::<Vec<_>>();
    assert_eq!(rows.len(), 1, "{text}");
    assert!(rows[0].contains("test-secret"), "{text}");
}

#[tokio::test]
async fn empty_cluster_is_not_an_error() {
    let scan = scan::scan(&FakeCluster::default())
        .await
        .expect("scan must succeed");
    assert!(scan.records.is_empty());
    assert!(scan.failures.is_empty());
}

#[tokio::test]
async fn ignores_secrets_of_other_types() {
    let cluster = FakeCluster::default().with_namespace(
        "default",
        vec![
            opaque_secret("default", "config"),
            secret("default", "token", "kubernetes.io/service-account-token", Default::default()),
        ],
    );

    let scan = scan::scan(&cluster).await.expect("scan must succeed");
    assert!(scan.records.is_empty());
    assert!(scan.failures.is_empty());
}

#[tokio::test]
async fn undecodable_certificate_is_one_failure() {
    let cluster = FakeCluster::default().with_namespace(
        "default",
        vec![tls_secret("default", "broken", "this is not PEM")],
    );

    let scan = scan::scan(&cluster).await.expect("scan must succeed");
    assert!(scan.records.is_empty());
    assert_eq!(scan.failures.len(), 1);

    let failure = &scan.failures[0];
    assert_eq!(failure.stage, Stage::DecodePem);
    assert_eq!(failure.namespace, "default");
    assert_eq!(failure.secret_name.as_deref(), Some("broken"));
}

#[tokio::test]
async fn unparseable_certificate_does_not_block_later_secrets() {
    let garbage = "-----BEGIN CERTIFICATE-----\naGVsbG8gd29ybGQ=\n-----END CERTIFICATE-----\n";
    let cluster = FakeCluster::default().with_namespace(
        "default",
        vec![
            tls_secret("default", "garbage", garbage),
            tls_secret("default", "good", &valid_for_days(30)),
        ],
    );

    let scan = scan::scan(&cluster).await.expect("scan must succeed");
    assert_eq!(scan.failures.len(), 1);
    assert_eq!(scan.failures[0].stage, Stage::ParseCertificate);
    assert_eq!(scan.records.len(), 1);
    assert_eq!(scan.records[0].secret_name, "good");
}

#[tokio::test]
async fn secret_listing_failures_are_isolated() {
    let cluster = FakeCluster::default()
        .with_forbidden_namespace("a")
        .with_namespace("b", vec![tls_secret("b", "web", &valid_for_days(90))]);

    let scan = scan::scan(&cluster).await.expect("scan must succeed");

    assert_eq!(scan.records.len(), 1);
    assert_eq!(scan.records[0].namespace, "b");

    assert_eq!(scan.failures.len(), 1);
    assert_eq!(scan.failures[0].stage, Stage::ListSecrets);
    assert_eq!(scan.failures[0].namespace, "a");
    assert_eq!(scan.failures[0].secret_name, None);
    assert_eq!(scan.failed_namespaces().collect::<Vec<_>>(), vec!["a"]);
}

#[tokio::test]
async fn namespace_listing_failure_is_fatal() {
    let cluster = FakeCluster::default()
        .with_namespace("b", vec![tls_secret("b", "web", &valid_for_days(90))])
        .forbid_namespaces();

    match scan::scan(&cluster).await {
        Err(ScanError::ListNamespaces(error)) => {
            assert_eq!(error.to_string(), "namespaces is forbidden")
        }
        Ok(scan) => panic!("scan must fail: {scan:?}"),
    }
}

#[tokio::test]
async fn expired_certificates_are_negative() {
    let cluster = FakeCluster::default().with_namespace(
        "default",
        vec![tls_secret("default", "old", &expired_days_ago(10))],
    );

    let scan = scan::scan(&cluster).await.expect("scan must succeed");
    assert_eq!(scan.records.len(), 1);
    let days = scan.records[0].remaining_days;
    assert!((-11..=-10).contains(&days), "unexpected remaining days: {days}");
}

#[tokio::test]
async fn namespaces_are_scanned_in_listing_order() {
    let cluster = FakeCluster::default()
        .with_namespace("zeta", vec![tls_secret("zeta", "z", &valid_for_days(10))])
        .with_namespace("alpha", vec![tls_secret("alpha", "a", &valid_for_days(20))]);

    let scan = scan::scan(&cluster).await.expect("scan must succeed");
    let namespaces = scan
        .records
        .iter()
        .map(|r| r.namespace.as_str())
        .collect::<Vec<_>>();
    assert_eq!(namespaces, vec!["zeta", "alpha"]);
}
