//! sendpathd: send-path benchmark server.

use std::net::SocketAddr;

use anyhow::Result;

use sendpath_core::args::ServerArgs;
use sendpath_core::config::BenchConfig;
use sendpathd::{Acceptor, SessionPlan};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = match ServerArgs::parse(std::env::args()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let config = BenchConfig::load_or_default();

    let strategy = args.strategy.unwrap_or(config.server.strategy);
    let plan = SessionPlan {
        strategy,
        message_size: args.message_size,
        duration: args.duration,
        zerocopy: config.zerocopy.clone(),
    };

    let addr = SocketAddr::new(config.network.bind_addr, config.network.port);
    let acceptor = Acceptor::bind(addr, config.network.backlog)?;
    println!("Server listening on port {}", acceptor.local_addr()?.port());
    tracing::info!(
        %strategy,
        message_size = plan.message_size,
        threads = args.threads,
        duration_s = plan.duration.as_secs(),
        "sendpathd starting"
    );

    let outcomes = acceptor.serve(args.threads, &plan)?;

    let bytes: u64 = outcomes.iter().map(|o| o.bytes).sum();
    let messages: u64 = outcomes.iter().map(|o| o.messages).sum();
    tracing::info!(sessions = outcomes.len(), messages, bytes, "all sessions finished");
    Ok(())
}
