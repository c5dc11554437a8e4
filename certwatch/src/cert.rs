//! Extracts certificate details from the data of a `kubernetes.io/tls` secret.

use crate::scan::Stage;
use chrono::{DateTime, TimeDelta, Utc};
use k8s_openapi::ByteString;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use x509_parser::{
    error::{PEMError, X509Error},
    pem::Pem,
    prelude::*,
};

/// The secret type that marks a secret as holding a certificate and private key.
pub const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";

/// The data key holding the PEM-encoded certificate (or chain).
pub const TLS_CERT_KEY: &str = "tls.crt";

/// The parts of a leaf certificate that are tracked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Certificate {
    /// The issuer's distinguished name, e.g. `CN=example.com`.
    pub issuer: String,

    /// The end of the certificate's validity period.
    pub not_after: DateTime<Utc>,
}

/// The remaining lifetime of the certificate held by a single secret.
///
/// Records are computed fresh on every scan and are never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    /// The secret's namespace.
    pub namespace: String,

    /// The secret's name.
    pub secret_name: String,

    /// The certificate issuer's distinguished name.
    pub issuer: String,

    /// When the certificate expires.
    pub not_after: DateTime<Utc>,

    /// Whole days until `not_after`. Negative once the certificate has expired.
    pub remaining_days: i64,
}

/// Indicates that a certificate could not be read from a secret.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The secret has no PEM block in its certificate entry (or no entry at all)
    #[error("no PEM block found in {TLS_CERT_KEY}")]
    MissingPem,

    /// The PEM block was malformed
    #[error("invalid PEM data: {0}")]
    Pem(#[source] PEMError),

    /// The PEM block did not contain a valid X.509 certificate
    #[error("invalid X.509 certificate: {0}")]
    Parse(#[source] x509_parser::nom::Err<X509Error>),

    /// The certificate's expiry cannot be represented
    #[error("notAfter timestamp {0} is out of range")]
    NotAfterOutOfRange(i64),
}

// === impl Certificate ===

impl Certificate {
    /// Reads the leaf certificate from a TLS secret's data.
    ///
    /// Only the `tls.crt` entry is read; the private key is ignored.
    pub fn from_secret_data(
        data: Option<&BTreeMap<String, ByteString>>,
    ) -> Result<Self, ExtractError> {
        let pem = data
            .and_then(|data| data.get(TLS_CERT_KEY))
            .ok_or(ExtractError::MissingPem)?;
        Self::from_pem(&pem.0)
    }

    /// Parses the first PEM block in `pem` as an X.509 certificate.
    ///
    /// Any further blocks (i.e. the rest of a chain) are ignored.
    pub fn from_pem(pem: &[u8]) -> Result<Self, ExtractError> {
        let block = Pem::iter_from_buffer(pem)
            .next()
            .ok_or(ExtractError::MissingPem)?
            .map_err(ExtractError::Pem)?;
        Self::from_der(&block.contents)
    }

    /// Parses a DER-encoded X.509 certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, ExtractError> {
        let (_, cert) = X509Certificate::from_der(der).map_err(ExtractError::Parse)?;
        let ts = cert.validity().not_after.timestamp();
        let not_after =
            DateTime::from_timestamp(ts, 0).ok_or(ExtractError::NotAfterOutOfRange(ts))?;
        Ok(Self {
            issuer: cert.issuer().to_string(),
            not_after,
        })
    }

    /// Returns the number of whole days from `now` until the certificate expires.
    pub fn remaining_days(&self, now: DateTime<Utc>) -> i64 {
        remaining_days(self.not_after, now)
    }
}

/// Floors the time between `now` and `not_after` to whole days.
///
/// A certificate that expires in 23 hours has 0 days left; one that expired an
/// hour ago has -1.
pub fn remaining_days(not_after: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let day = TimeDelta::days(1).num_seconds();
    let delta = not_after - now;
    // `num_seconds` truncates toward zero; floor it so sub-second expiry is negative.
    let mut secs = delta.num_seconds();
    if delta < TimeDelta::seconds(secs) {
        secs -= 1;
    }
    secs.div_euclid(day)
}

// === impl CertificateRecord ===

impl CertificateRecord {
    /// Builds a record for the secret `namespace/secret_name` relative to `now`.
    pub fn new(
        namespace: impl Into<String>,
        secret_name: impl Into<String>,
        cert: Certificate,
        now: DateTime<Utc>,
    ) -> Self {
        let remaining_days = cert.remaining_days(now);
        Self {
            namespace: namespace.into(),
            secret_name: secret_name.into(),
            issuer: cert.issuer,
            not_after: cert.not_after,
            remaining_days,
        }
    }
}

// === impl ExtractError ===

impl ExtractError {
    /// Returns the scan stage at which extraction failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::MissingPem | Self::Pem(_) => Stage::DecodePem,
            Self::Parse(_) | Self::NotAfterOutOfRange(_) => Stage::ParseCertificate,
        }
    }
}
