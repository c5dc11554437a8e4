#![allow(dead_code)]

use certwatch::SecretSource;
use chrono::{Datelike, Days, NaiveDate, Utc};
use k8s_openapi::{
    api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::ObjectMeta, ByteString,
};
use maplit::btreemap;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::Notify;

/// An in-memory cluster.
#[derive(Debug, Default)]
pub struct FakeCluster {
    namespaces: Vec<String>,
    secrets: BTreeMap<String, Result<Vec<Secret>, String>>,
    namespaces_forbidden: bool,
    pub namespace_lists: Arc<AtomicUsize>,
    gate: Option<Arc<Notify>>,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FakeError(String);

impl FakeCluster {
    pub fn with_namespace(mut self, name: &str, secrets: Vec<Secret>) -> Self {
        self.namespaces.push(name.to_string());
        self.secrets.insert(name.to_string(), Ok(secrets));
        self
    }

    pub fn with_forbidden_namespace(mut self, name: &str) -> Self {
        self.namespaces.push(name.to_string());
        self.secrets.insert(
            name.to_string(),
            Err(format!("secrets is forbidden in namespace {name}")),
        );
        self
    }

    pub fn forbid_namespaces(mut self) -> Self {
        self.namespaces_forbidden = true;
        self
    }

    /// Blocks every secret listing until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

impl SecretSource for FakeCluster {
    type Error = FakeError;

    async fn list_namespaces(&self) -> Result<Vec<String>, FakeError> {
        self.namespace_lists.fetch_add(1, Ordering::SeqCst);
        if self.namespaces_forbidden {
            return Err(FakeError("namespaces is forbidden".to_string()));
        }
        Ok(self.namespaces.clone())
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, FakeError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.secrets.get(namespace) {
            Some(Ok(secrets)) => Ok(secrets.clone()),
            Some(Err(e)) => Err(FakeError(e.clone())),
            None => Err(FakeError(format!("namespace {namespace} not found"))),
        }
    }
}

pub fn secret(namespace: &str, name: &str, type_: &str, data: BTreeMap<String, ByteString>) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        type_: Some(type_.to_string()),
        data: Some(data),
        ..Default::default()
    }
}

pub fn tls_secret(namespace: &str, name: &str, cert_pem: &str) -> Secret {
    secret(
        namespace,
        name,
        "kubernetes.io/tls",
        btreemap! {
            "tls.crt".to_string() => ByteString(cert_pem.as_bytes().to_vec()),
            "tls.key".to_string() => ByteString(b"fake-key".to_vec()),
        },
    )
}

pub fn opaque_secret(namespace: &str, name: &str) -> Secret {
    secret(
        namespace,
        name,
        "Opaque",
        btreemap! {
            "tls.crt".to_string() => ByteString(b"not a certificate".to_vec()),
        },
    )
}

/// Mints a self-signed certificate for `example.com` valid from `not_before`
/// until midnight UTC at the start of `not_after`.
pub fn self_signed_pem(not_before: NaiveDate, not_after: NaiveDate) -> String {
    let mut params =
        rcgen::CertificateParams::new(vec!["example.com".to_string()]).expect("valid params");
    params.distinguished_name = rcgen::DistinguishedName::new();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, "example.com");
    params.not_before = rcgen::date_time_ymd(
        not_before.year(),
        not_before.month() as u8,
        not_before.day() as u8,
    );
    params.not_after = rcgen::date_time_ymd(
        not_after.year(),
        not_after.month() as u8,
        not_after.day() as u8,
    );
    let key = rcgen::KeyPair::generate().expect("failed to generate key");
    params
        .self_signed(&key)
        .expect("failed to sign certificate")
        .pem()
}

/// Mints a certificate that expires `days` days from today.
pub fn valid_for_days(days: u64) -> String {
    let today = Utc::now().date_naive();
    self_signed_pem(today, today + Days::new(days))
}

/// Mints a certificate that expired `days` days ago.
pub fn expired_days_ago(days: u64) -> String {
    let today = Utc::now().date_naive();
    let not_after = today - Days::new(days);
    self_signed_pem(not_after - Days::new(365), not_after)
}
