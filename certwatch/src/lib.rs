//! Tracks the remaining lifetime of TLS certificates stored in Kubernetes
//! secrets.
//!
//! `certwatch` lists every namespace in a cluster, reads each
//! `kubernetes.io/tls` secret, parses the leaf certificate from its `tls.crt`
//! entry and computes how many days remain before it expires. The results are
//! either printed once as a report or exported continuously as the
//! `tls_remaining_lifetime` gauge on a Prometheus scrape endpoint.
//!
//! # Modules
//!
//! - [`cert`]: decodes and parses the certificate held by a secret.
//! - [`scan`]: walks namespaces and secrets, isolating per-item failures.
//! - [`metrics`]: the gauge family updated from each scan.
//! - [`admin`]: the HTTP server exposing metrics and probes.
//! - [`report`]: one-shot table and JSON output.
//! - [`driver`]: runs scans once or on an interval until shutdown.
//! - [`client`]: builds the Kubernetes client used as a [`SecretSource`].
//! - [`shutdown`]: signal handling and graceful drain.
//! - [`log`]: configures the global tracing subscriber.
//!
//! # TLS Features
//!
//! - **rustls-tls** (default): the Kubernetes client uses [`rustls`].
//! - **openssl-tls**: the Kubernetes client uses OpenSSL.
//!
//! [`rustls`]: https://crates.io/crates/rustls

#![deny(rust_2018_idioms, missing_docs)]
#![forbid(unsafe_code)]

pub mod admin;
pub mod cert;
pub mod client;
pub mod driver;
pub mod log;
pub mod metrics;
pub mod report;
pub mod scan;
pub mod shutdown;

pub use self::admin::AdminArgs;
pub use self::cert::{Certificate, CertificateRecord};
pub use self::client::ClientArgs;
pub use self::log::{LogFilter, LogFormat, LogInitError};
pub use self::metrics::CertMetrics;
pub use self::scan::{Scan, ScanError, ScanFailure, SecretSource, Stage};
