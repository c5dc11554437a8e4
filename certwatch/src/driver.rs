//! Runs scans, either once for a report or repeatedly to export gauges.

use crate::{
    admin::Readiness,
    metrics::CertMetrics,
    report::{self, OutputFormat},
    scan::{self, Scan, ScanError, SecretSource},
    shutdown,
};
use kube_core::Duration as KubeDuration;
use std::{fmt, io, str::FromStr};
use thiserror::Error;
use tokio::time;
use tracing::{info, info_span, warn, Instrument};

/// Indicates that a one-shot report could not be produced
#[derive(Debug, Error)]
pub enum ReportError {
    /// The scan could not run
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The report could not be written
    #[error("failed to write report: {0}")]
    Write(#[from] io::Error),
}

/// Scans once and writes every certificate that could be read to `out`.
///
/// Per-secret failures are logged by the scan and returned with the results;
/// they do not fail the report.
pub async fn report<S, W>(source: &S, format: OutputFormat, mut out: W) -> Result<Scan, ReportError>
where
    S: SecretSource,
    W: io::Write,
{
    let scan = scan::scan(source).instrument(info_span!("scan")).await?;
    report::write(&mut out, format, &scan.records)?;
    out.flush()?;
    Ok(scan)
}

/// The time to wait between scans.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Interval(time::Duration);

/// Indicates that an interval could not be parsed
#[derive(Debug, Error)]
pub enum InvalidInterval {
    /// The value is not a duration, e.g. `30s` or `5m`
    #[error("invalid duration: {0}")]
    Parse(String),

    /// The value is zero or negative
    #[error("interval must be positive")]
    NotPositive,
}

/// Rescans a cluster on an interval, exporting the results as gauges.
#[derive(Debug)]
pub struct Daemon<S> {
    source: S,
    metrics: CertMetrics,
    interval: Interval,
    ready: Readiness,
    prune: bool,
}

// === impl Daemon ===

impl<S> Daemon<S>
where
    S: SecretSource + Send + Sync + 'static,
{
    /// Creates a daemon that pushes each scan to `metrics`.
    ///
    /// `ready` is set once the first scan has been recorded.
    pub fn new(source: S, metrics: CertMetrics, interval: Interval, ready: Readiness) -> Self {
        Self {
            source,
            metrics,
            interval,
            ready,
            prune: true,
        }
    }

    /// Keeps gauges for secrets that later scans no longer observe.
    pub fn retain_stale(mut self, retain: bool) -> Self {
        self.prune = !retain;
        self
    }

    /// Scans until shutdown is signaled.
    ///
    /// Shutdown is only observed between scans: a scan that is in progress
    /// when the signal arrives runs to completion first.
    pub async fn run(mut self, shutdown: shutdown::Watch) -> CertMetrics {
        loop {
            self.scan_once().instrument(info_span!("scan")).await;

            tokio::select! {
                _ = time::sleep(self.interval.0) => {}
                release = shutdown.clone().signaled() => {
                    info!("Shutting down");
                    self.ready.set(false);
                    drop(release);
                    return self.metrics;
                }
            }
        }
    }

    async fn scan_once(&mut self) {
        match scan::scan(&self.source).await {
            Ok(scan) => {
                self.metrics.apply(&scan, self.prune);
                self.ready.set(true);
                info!(
                    certificates = scan.records.len(),
                    failures = scan.failures.len(),
                    "Scanned"
                );
            }
            // The gauges keep their last values until the next scan succeeds.
            Err(error) => warn!(%error, "Scan failed"),
        }
    }
}

// === impl Interval ===

impl Interval {
    /// Returns the interval as a [`std::time::Duration`].
    pub fn as_duration(&self) -> time::Duration {
        self.0
    }
}

impl TryFrom<time::Duration> for Interval {
    type Error = InvalidInterval;

    fn try_from(d: time::Duration) -> Result<Self, InvalidInterval> {
        if d.is_zero() {
            return Err(InvalidInterval::NotPositive);
        }
        Ok(Self(d))
    }
}

impl FromStr for Interval {
    type Err = InvalidInterval;

    fn from_str(s: &str) -> Result<Self, InvalidInterval> {
        if s.trim_start().starts_with('-') {
            return Err(InvalidInterval::NotPositive);
        }
        let d = s
            .parse::<KubeDuration>()
            .map_err(|e| InvalidInterval::Parse(e.to_string()))?;
        Self::try_from(time::Duration::from(d))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&KubeDuration::from(self.0), f)
    }
}
