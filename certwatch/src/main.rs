#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

use anyhow::{bail, Result};
use certwatch::{
    admin::AdminArgs,
    driver::{self, Daemon, Interval},
    log::LogArgs,
    report::OutputFormat,
    shutdown::{self, Aborted},
    CertMetrics, ClientArgs,
};
use clap::{Parser, Subcommand};
use prometheus_client::registry::Registry;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{info, Instrument};

#[derive(Parser)]
#[clap(version, about)]
struct Args {
    #[clap(flatten)]
    log: LogArgs,

    #[clap(flatten)]
    client: ClientArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan once and print the remaining lifetime of every TLS certificate
    Report {
        /// The output format
        #[clap(long, short = 'o', value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Scan repeatedly and export gauges until a shutdown signal is received
    Export {
        #[clap(flatten)]
        admin: AdminArgs,

        /// The time to wait between scans, e.g. `30s` or `5m`
        #[clap(long, env = "CERTWATCH_INTERVAL")]
        interval: Interval,

        /// Keep gauges for secrets that are no longer found
        #[clap(long)]
        retain_stale: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        log,
        client,
        command,
    } = Args::parse();

    log.try_init()?;
    let client = client.try_client().await?;

    match command {
        Command::Report { output } => {
            let scan = driver::report(&client, output, std::io::stdout()).await?;
            if !scan.failures.is_empty() {
                tracing::warn!(
                    failures = scan.failures.len(),
                    "Some secrets could not be read"
                );
            }
        }

        Command::Export {
            admin,
            interval,
            retain_stale,
        } => {
            let mut registry = Registry::default();
            let metrics = CertMetrics::register(&mut registry);

            let (shutdown, watch) = shutdown::sigint_or_sigterm()?;
            let admin = admin.into_builder(registry).bind().await?.spawn();
            info!(addr = %admin.local_addr(), %interval, "Exporting TLS certificate lifetimes");

            let ready = admin.readiness();
            let admin = admin.into_join_handle();
            let daemon = tokio::spawn(
                Daemon::new(client, metrics, interval, ready)
                    .retain_stale(retain_stale)
                    .run(watch)
                    .instrument(tracing::info_span!("export")),
            );

            // Block until a signal is received and the current scan completes.
            supervise(shutdown.signaled(), daemon, admin).await?;
            info!("Shutdown complete");
        }
    }

    Ok(())
}

/// Waits for shutdown, failing if the scan loop or the admin server stops first.
async fn supervise(
    shutdown: impl Future<Output = Result<(), Aborted>>,
    daemon: JoinHandle<CertMetrics>,
    admin: JoinHandle<()>,
) -> Result<()> {
    tokio::select! {
        biased;

        res = shutdown => {
            if res.is_err() {
                bail!("aborted");
            }
            Ok(())
        }

        res = daemon => match res {
            Err(error) => bail!("scan loop failed: {error}"),
            Ok(_) => bail!("scan loop stopped before shutdown"),
        },

        res = admin => match res {
            Err(error) => bail!("admin server failed: {error}"),
            Ok(()) => bail!("admin server stopped before shutdown"),
        },
    }
}
