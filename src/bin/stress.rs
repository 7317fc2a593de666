//! kstore Stress Binary
//!
//! Hammers a registry with concurrent writers and readers and reports any
//! consistency violation.

use clap::Parser;
use kstore::stress::{self, StressConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// kstore stress driver
#[derive(Parser, Debug)]
#[command(name = "kstore-stress")]
#[command(about = "Concurrent consistency check for the kstore engine")]
#[command(version)]
struct Args {
    /// Groups to exercise (1-4)
    #[arg(short, long, default_value = "2")]
    groups: usize,

    /// Writer threads per group
    #[arg(short, long, default_value = "2")]
    writers: usize,

    /// Reader threads
    #[arg(short, long, default_value = "4")]
    readers: usize,

    /// Distinct keys per group
    #[arg(short, long, default_value = "64")]
    keys: u64,

    /// Operations per writer
    #[arg(short, long, default_value = "100000")]
    ops: u64,

    /// Every n-th write is a remove (0 disables removes)
    #[arg(long, default_value = "5")]
    remove_every: u64,

    /// Payload size in bytes
    #[arg(short, long, default_value = "64")]
    payload_len: usize,

    /// Flush retired snapshots to the collector on every write
    #[arg(long)]
    eager_reclaim: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("kstore stress v{}", kstore::VERSION);

    let config = StressConfig {
        groups: args.groups,
        writers_per_group: args.writers,
        readers: args.readers,
        keys: args.keys,
        ops_per_writer: args.ops,
        remove_every: args.remove_every,
        payload_len: args.payload_len,
        eager_reclaim: args.eager_reclaim,
    };

    let report = match stress::run(&config) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Stress run failed to start: {}", e);
            std::process::exit(2);
        }
    };

    tracing::info!("Final group sizes: {:?}", report.final_sizes);
    tracing::info!(
        "Reclaimed {}/{} indexes, {}/{} entries",
        report.reclaim.reclaimed_indexes,
        report.reclaim.retired_indexes,
        report.reclaim.reclaimed_entries,
        report.reclaim.retired_entries
    );

    if !report.is_clean() {
        tracing::error!("{} violations detected", report.violations);
        std::process::exit(1);
    }

    tracing::info!("No violations");
}
