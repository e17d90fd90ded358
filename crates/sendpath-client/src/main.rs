//! sendpath-client: receiving side of the send-path benchmark.
//!
//! Opens one connection per thread, samples each for the run's duration and
//! prints a throughput/latency line per connection.

use std::net::{SocketAddr, TcpStream};
use std::thread;

use anyhow::{Context, Result};

use sendpath_core::args::ClientArgs;
use sendpath_core::config::BenchConfig;
use sendpath_core::record::{append_csv, MeasurementRow};
use sendpath_core::sample::run_sampler;
use sendpath_core::Report;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = match ClientArgs::parse(std::env::args()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let config = BenchConfig::load_or_default();

    let server = SocketAddr::new(args.server_ip, config.network.port);
    tracing::info!(%server, threads = args.threads, message_size = args.message_size, "sendpath-client starting");

    let mut handles = Vec::with_capacity(args.threads);
    for id in 0..args.threads {
        let handle = thread::Builder::new()
            .name(format!("sampler-{id}"))
            .spawn(move || sample_connection(id, server, args.message_size, args.duration))
            .with_context(|| format!("failed to spawn sampler-{id}"))?;
        handles.push(handle);
    }

    let mut rows = Vec::new();
    for (id, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(Some(report)) => rows.push(MeasurementRow {
                implementation: config.report.label.clone(),
                message_size: args.message_size,
                threads: args.threads,
                report,
            }),
            Ok(None) => {}
            Err(_) => tracing::error!(connection = id, "sampler thread panicked"),
        }
    }

    if let Some(path) = &config.report.csv_path {
        append_csv(path, &rows).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), rows = rows.len(), "measurements appended");
    }
    Ok(())
}

/// Connect and sample one stream. `None` if the connection failed.
fn sample_connection(
    id: usize,
    server: SocketAddr,
    message_size: usize,
    duration: std::time::Duration,
) -> Option<Report> {
    let mut stream = match TcpStream::connect(server) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(connection = id, %server, error = %e, "connect failed");
            return None;
        }
    };

    let sample = run_sampler(&mut stream, message_size, duration);
    let report = sample.report(message_size);
    tracing::debug!(
        connection = id,
        bytes = sample.total_bytes(),
        elapsed_ms = sample.elapsed().as_millis() as u64,
        "sample complete"
    );
    println!("{report}");
    Some(report)
}
