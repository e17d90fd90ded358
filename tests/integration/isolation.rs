//! A peer going away ends its own session and nothing else.

use std::time::Duration;

use sendpath_core::sample::run_sampler;
use sendpath_core::{Report, StrategyKind};
use sendpathd::SessionEnd;

use crate::*;

const MESSAGE_SIZE: usize = 4096;
const DURATION: Duration = Duration::from_secs(1);

fn run_isolation(strategy: StrategyKind) {
    let server = TestServer::start(strategy, MESSAGE_SIZE, 2, DURATION).unwrap();

    // Session 0: take one message and hang up.
    let mut quitter = server.connect().unwrap();
    read_message(&mut quitter, MESSAGE_SIZE).unwrap();
    drop(quitter);

    // Session 1: read for the whole run.
    let mut stayer = server.connect().unwrap();
    let sample = run_sampler(&mut stayer, MESSAGE_SIZE, DURATION + CLIENT_SLACK);
    assert!(matches!(sample.report(MESSAGE_SIZE), Report::Measured { .. }), "{strategy}");
    drop(stayer);

    let outcomes = server.finish().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(
        matches!(outcomes[0].end, SessionEnd::SendFailed(_) | SessionEnd::PeerClosed),
        "{strategy}: quitter ended with {:?}",
        outcomes[0].end
    );
    assert_eq!(outcomes[1].end, SessionEnd::BudgetExpired, "{strategy}");
    assert_eq!(outcomes[1].bytes, sample.total_bytes());
}

#[test]
fn test_disconnect_is_isolated_copy() {
    run_isolation(StrategyKind::CopyLinearize);
}

#[test]
fn test_disconnect_is_isolated_gather() {
    run_isolation(StrategyKind::GatherSend);
}

#[test]
fn test_disconnect_is_isolated_zero_copy() {
    run_isolation(StrategyKind::ZeroCopy);
}
