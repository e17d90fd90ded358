//! End-to-end over loopback, one test per strategy.

use std::time::Duration;

use sendpath_core::sample::run_sampler;
use sendpath_core::{Report, StrategyKind};
use sendpathd::SessionEnd;

use crate::*;

const MESSAGE_SIZE: usize = 1024;
const DURATION: Duration = Duration::from_secs(1);

fn run_loopback(strategy: StrategyKind) {
    let server = TestServer::start(strategy, MESSAGE_SIZE, 1, DURATION).unwrap();
    let mut stream = server.connect().unwrap();

    let first = read_message(&mut stream, MESSAGE_SIZE).unwrap();
    assert_eq!(first, expected_message(MESSAGE_SIZE), "{strategy}: first message");

    let sample = run_sampler(&mut stream, MESSAGE_SIZE, DURATION + CLIENT_SLACK);
    let report = sample.report(MESSAGE_SIZE);
    println!("{strategy}: {report}");

    assert!(sample.total_bytes() > 0, "{strategy}: nothing received");
    match report {
        Report::Measured { .. } => {
            let gbps = report.throughput_gbps().unwrap();
            assert!(gbps.is_finite() && gbps > 0.0, "{strategy}: throughput {gbps}");
            let latency = report.latency_us().unwrap();
            assert!(latency.is_finite() && latency > 0.0, "{strategy}: latency {latency}");
        }
        Report::NoData => panic!("{strategy}: no data"),
    }

    drop(stream);
    let outcomes = server.finish().unwrap();
    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert_eq!(outcome.end, SessionEnd::BudgetExpired, "{strategy}");
    assert!(outcome.messages > 0);
    // A throttled zero-copy send may run out of budget mid-message.
    assert!(outcome.bytes >= outcome.messages * MESSAGE_SIZE as u64);
    assert_eq!(outcome.bytes, sample.total_bytes() + MESSAGE_SIZE as u64);
}

#[test]
fn test_copy_linearize_loopback() {
    run_loopback(StrategyKind::CopyLinearize);
}

#[test]
fn test_gather_send_loopback() {
    run_loopback(StrategyKind::GatherSend);
}

#[test]
fn test_zero_copy_loopback() {
    run_loopback(StrategyKind::ZeroCopy);
}

#[test]
fn test_zero_copy_reports_completion_stats() {
    let server = TestServer::start(StrategyKind::ZeroCopy, 4096, 1, Duration::from_millis(300)).unwrap();
    let mut stream = server.connect().unwrap();
    run_sampler(&mut stream, 4096, Duration::from_millis(300) + CLIENT_SLACK);
    drop(stream);

    let outcomes = server.finish().unwrap();
    let stats = outcomes[0].zerocopy.as_ref().expect("zero-copy stats");
    if stats.enabled {
        // Loopback reports every completion, so the final drain settles all
        // of them through the real error-queue parser.
        assert!(stats.submitted >= outcomes[0].messages);
        assert!(stats.submitted > 0);
        assert_eq!(stats.confirmed, stats.submitted, "{stats:?}");
        assert!(!stats.leaked, "{stats:?}");
    } else {
        assert!(stats.fell_back, "SO_ZEROCOPY refused without fallback");
    }
}
