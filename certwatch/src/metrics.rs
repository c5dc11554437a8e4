//! The `tls_remaining_lifetime` gauge family.
//!
//! Each TLS secret is tracked by its `(namespace, secret_name)` identity.
//! Recording a certificate overwrites the previous value for that identity.

use crate::{cert::CertificateRecord, scan::Scan};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{family::Family, gauge::Gauge},
    registry::Registry,
};
use std::collections::HashSet;

/// Gauges for the remaining lifetime of each observed certificate.
///
/// The underlying family is shared with the registry it was registered in, so
/// updates are visible to the metrics endpoint as soon as they are recorded.
#[derive(Debug, Default)]
pub struct CertMetrics {
    remaining_lifetime: Family<CertLabels, Gauge>,
    known: HashSet<CertLabels>,
}

/// Identifies the secret a gauge describes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, EncodeLabelSet)]
pub struct CertLabels {
    /// The secret's namespace
    pub namespace: String,

    /// The secret's name
    pub secret_name: String,
}

// === impl CertMetrics ===

impl CertMetrics {
    /// Registers the gauge family in the given registry.
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "tls_remaining_lifetime",
            "Remaining lifetime of TLS certificates in days",
            metrics.remaining_lifetime.clone(),
        );
        metrics
    }

    /// Sets the gauge for the record's secret to its remaining days.
    pub fn record(&mut self, record: &CertificateRecord) {
        let labels = CertLabels::from(record);
        self.remaining_lifetime
            .get_or_create(&labels)
            .set(record.remaining_days);
        self.known.insert(labels);
    }

    /// Records every certificate in a completed scan.
    ///
    /// When `prune` is set, gauges for secrets that the scan no longer
    /// produced are removed. Secrets in namespaces that could not be listed
    /// during the scan keep their last value.
    pub fn apply(&mut self, scan: &Scan, prune: bool) {
        for record in &scan.records {
            self.record(record);
        }

        if prune {
            let removed = self.retain_observed(scan);
            if removed > 0 {
                tracing::info!(removed, "Removed gauges for secrets no longer observed");
            }
        }
    }

    /// Removes the gauges of secrets that were not observed by `scan`,
    /// returning how many were removed.
    pub fn retain_observed(&mut self, scan: &Scan) -> usize {
        let observed = scan
            .records
            .iter()
            .map(CertLabels::from)
            .collect::<HashSet<_>>();
        let unlisted = scan.failed_namespaces().collect::<HashSet<_>>();

        let stale = self
            .known
            .iter()
            .filter(|l| !observed.contains(*l) && !unlisted.contains(l.namespace.as_str()))
            .cloned()
            .collect::<Vec<_>>();
        for labels in &stale {
            tracing::debug!(namespace = %labels.namespace, secret = %labels.secret_name, "Stale");
            self.remaining_lifetime.remove(labels);
            self.known.remove(labels);
        }
        stale.len()
    }

    /// Returns the number of secrets currently tracked.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Returns true if no secrets are tracked.
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

// === impl CertLabels ===

impl From<&CertificateRecord> for CertLabels {
    fn from(record: &CertificateRecord) -> Self {
        Self {
            namespace: record.namespace.clone(),
            secret_name: record.secret_name.clone(),
        }
    }
}
