//! Walks every namespace and TLS secret in a cluster.
//!
//! A scan touches each namespace and each secret exactly once. Only a failure
//! to list namespaces aborts it; every other failure is recorded as a
//! [`ScanFailure`] and the scan moves on, so that one bad secret (or one
//! forbidden namespace) cannot blank out the results for the rest of the
//! cluster.

use crate::cert::{Certificate, CertificateRecord, TLS_SECRET_TYPE};
use chrono::Utc;
use k8s_openapi::api::core::v1::Secret;
use std::{fmt, future::Future};
use thiserror::Error;
use tracing::{debug, info_span, warn, Instrument};

/// Lists the cluster resources a scan needs.
///
/// This is implemented for [`kube_client::Client`]; tests provide in-memory
/// implementations.
pub trait SecretSource {
    /// The error returned by failed list calls.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lists the names of all namespaces.
    fn list_namespaces(&self) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send;

    /// Lists all secrets in `namespace`.
    fn list_secrets(
        &self,
        namespace: &str,
    ) -> impl Future<Output = Result<Vec<Secret>, Self::Error>> + Send;
}

/// The results of a completed scan.
#[derive(Clone, Debug, Default)]
pub struct Scan {
    /// One record per TLS secret whose certificate could be read.
    pub records: Vec<CertificateRecord>,

    /// Namespaces and secrets that could not be processed.
    pub failures: Vec<ScanFailure>,
}

/// A namespace or secret that could not be processed during a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanFailure {
    /// The namespace being processed.
    pub namespace: String,

    /// The secret being processed, if the failure is specific to one secret.
    pub secret_name: Option<String>,

    /// Where the failure occurred.
    pub stage: Stage,

    /// A description of the underlying error.
    pub detail: String,
}

/// The step of a scan at which a failure occurred.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Listing namespaces. This is fatal to a scan and reported as [`ScanError`].
    ListNamespaces,

    /// Listing the secrets of a namespace.
    ListSecrets,

    /// Decoding the PEM-encoded certificate entry.
    DecodePem,

    /// Parsing the DER-encoded certificate.
    ParseCertificate,
}

/// Indicates that a scan could not run at all.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Namespaces could not be listed
    #[error("failed to list namespaces: {0}")]
    ListNamespaces(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// Scans every TLS secret visible through `source`.
///
/// Namespaces are processed in the order they are listed. The remaining
/// lifetime of each certificate is computed against the clock at the time its
/// secret is processed.
pub async fn scan<S: SecretSource>(source: &S) -> Result<Scan, ScanError> {
    let namespaces = source
        .list_namespaces()
        .await
        .map_err(|e| ScanError::ListNamespaces(e.into()))?;
    debug!(namespaces = namespaces.len(), "Listed namespaces");

    let mut scan = Scan::default();
    for namespace in namespaces {
        scan_namespace(source, &namespace, &mut scan)
            .instrument(info_span!("ns", %namespace))
            .await;
    }

    debug!(
        records = scan.records.len(),
        failures = scan.failures.len(),
        "Scan complete"
    );
    Ok(scan)
}

async fn scan_namespace<S: SecretSource>(source: &S, namespace: &str, scan: &mut Scan) {
    let secrets = match source.list_secrets(namespace).await {
        Ok(secrets) => secrets,
        Err(error) => {
            warn!(%error, "Failed to list secrets");
            scan.failures.push(ScanFailure {
                namespace: namespace.to_string(),
                secret_name: None,
                stage: Stage::ListSecrets,
                detail: error.to_string(),
            });
            return;
        }
    };

    let mut skipped = 0usize;
    for secret in &secrets {
        if !is_tls(secret) {
            skipped += 1;
            continue;
        }

        match extract(namespace, secret) {
            Ok(record) => {
                debug!(
                    secret = %record.secret_name,
                    remaining_days = record.remaining_days,
                    "Read certificate"
                );
                scan.records.push(record);
            }
            Err(failure) => {
                warn!(
                    secret = failure.secret_name.as_deref().unwrap_or_default(),
                    stage = %failure.stage,
                    error = %failure.detail,
                    "Failed to read certificate"
                );
                scan.failures.push(failure);
            }
        }
    }
    debug!(secrets = secrets.len(), skipped, "Listed secrets");
}

/// Returns true if the secret is declared to hold a TLS certificate and key.
pub fn is_tls(secret: &Secret) -> bool {
    secret.type_.as_deref() == Some(TLS_SECRET_TYPE)
}

/// Reads the certificate from a TLS secret in `namespace`.
///
/// Callers are expected to have checked [`is_tls`].
pub fn extract(namespace: &str, secret: &Secret) -> Result<CertificateRecord, ScanFailure> {
    let name = secret.metadata.name.clone().unwrap_or_default();
    match Certificate::from_secret_data(secret.data.as_ref()) {
        Ok(cert) => Ok(CertificateRecord::new(namespace, name, cert, Utc::now())),
        Err(error) => Err(ScanFailure {
            namespace: namespace.to_string(),
            secret_name: Some(name),
            stage: error.stage(),
            detail: error.to_string(),
        }),
    }
}

// === impl Scan ===

impl Scan {
    /// Iterates over the namespaces whose secrets could not be listed.
    pub fn failed_namespaces(&self) -> impl Iterator<Item = &str> + '_ {
        self.failures
            .iter()
            .filter(|f| f.stage == Stage::ListSecrets)
            .map(|f| f.namespace.as_str())
    }
}

// === impl ScanFailure ===

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.secret_name {
            Some(name) => write!(f, "{}/{}: {}: {}", self.namespace, name, self.stage, self.detail),
            None => write!(f, "{}: {}: {}", self.namespace, self.stage, self.detail),
        }
    }
}

// === impl Stage ===

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ListNamespaces => "list-namespaces",
            Self::ListSecrets => "list-secrets",
            Self::DecodePem => "decode-pem",
            Self::ParseCertificate => "parse-certificate",
        })
    }
}
