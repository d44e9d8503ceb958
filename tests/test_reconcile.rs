/// Reconciliation engine tests against an in-memory exchange

mod common;

use common::{rec, MockExchange};
use feed_reconciler::{
    project, Outcome, ReconcileContext, Reconciler, Request, ResendPolicy, Session,
};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::time::Duration;

fn reconcile(exchange: MockExchange, policy: ResendPolicy) -> (feed_reconciler::Reconciliation, MockExchange) {
    let mut reconciler = Reconciler::new(Session::new(exchange), policy);
    let result = reconciler.run().unwrap();
    (result, reconciler.into_session().into_transport())
}

fn sequences(result: &feed_reconciler::Reconciliation) -> Vec<u32> {
    result.records.sequences().collect()
}

#[test]
fn test_single_gap_recovered() {
    let exchange = MockExchange::streaming(&[rec(1), rec(2), rec(4), rec(5)]).on_resend(3, rec(3));
    let (result, exchange) = reconcile(exchange, ResendPolicy::default());

    assert_eq!(exchange.requests, vec![Request::StreamAll, Request::Resend(3)]);
    assert_eq!(sequences(&result), vec![1, 2, 3, 4, 5]);
    assert_eq!(result.outcome, Outcome::Complete);
    assert_eq!(result.stats.gaps_recovered(), 1);
}

#[test]
fn test_single_gap_times_out() {
    let exchange = MockExchange::streaming(&[rec(1), rec(2), rec(4), rec(5)]);
    let (result, exchange) = reconcile(exchange, ResendPolicy::default());

    assert_eq!(exchange.resend_requests(), vec![3]);
    assert_eq!(sequences(&result), vec![1, 2, 4, 5]);
    assert_eq!(
        result.outcome,
        Outcome::Partial { unrecovered: vec![3], unrequestable: vec![] }
    );
    assert_eq!(result.stats.gaps_unrecovered(), 1);
}

#[test]
fn test_full_stream_issues_no_resends() {
    let exchange = MockExchange::streaming(&[rec(1), rec(2), rec(3)]);
    let (result, exchange) = reconcile(exchange, ResendPolicy::default());

    assert_eq!(exchange.requests, vec![Request::StreamAll]);
    assert!(result.is_complete());
    assert_eq!(result.stats.resend_requests(), 0);
}

#[test]
fn test_empty_stream_is_empty_output() {
    let (result, exchange) = reconcile(MockExchange::default(), ResendPolicy::default());

    assert_eq!(exchange.requests, vec![Request::StreamAll]);
    assert!(result.records.is_empty());
    assert!(result.is_complete());
    assert!(project(&result.records).is_empty());
}

#[test]
fn test_out_of_order_arrivals_are_sorted() {
    let exchange = MockExchange::streaming(&[rec(5), rec(1), rec(3), rec(2), rec(4)]);
    let (result, _) = reconcile(exchange, ResendPolicy::default());

    let out: Vec<String> = project(&result.records).into_iter().map(|r| r.sequence).collect();
    assert_eq!(out, vec!["1", "2", "3", "4", "5"]);
}

#[test]
fn test_resend_overwrites_existing_sequence() {
    // Gap at 2 is answered with a fresh copy of 3 first; the stored 3 is replaced
    let mut newer = rec(3);
    newer.quantity = 999;
    let exchange = MockExchange::streaming(&[rec(1), rec(3)]).on_resend(2, newer);
    let (result, _) = reconcile(exchange, ResendPolicy::default());

    assert_eq!(result.records.len(), 2);
    assert_eq!(result.records.get(3).unwrap().quantity, 999);
    assert_eq!(result.stats.divergent_duplicates(), 1);
    assert_eq!(result.outcome.missing_ranges(), vec![(2, 2)]);
}

#[test]
fn test_duplicate_in_stream_last_write_wins() {
    let mut second = rec(2);
    second.price = 1;
    let exchange = MockExchange::streaming(&[rec(1), rec(2), second]);
    let (result, _) = reconcile(exchange, ResendPolicy::default());

    assert_eq!(result.records.len(), 2);
    assert_eq!(result.records.get(2).unwrap().price, 1);
}

#[test]
fn test_retry_policy_repeats_request() {
    let exchange = MockExchange::streaming(&[rec(1), rec(3)]);
    let policy = ResendPolicy::new(3, Duration::ZERO);
    let (result, exchange) = reconcile(exchange, policy);

    assert_eq!(exchange.resend_requests(), vec![2, 2, 2]);
    assert_eq!(result.stats.resend_requests(), 3);
    assert_eq!(result.outcome.missing_ranges(), vec![(2, 2)]);
}

#[test]
fn test_truncated_tail_is_discarded() {
    let exchange = MockExchange::streaming(&[rec(1), rec(2)]).with_stream_tail(&[0u8; 9]);
    let (result, _) = reconcile(exchange, ResendPolicy::default());

    assert_eq!(sequences(&result), vec![1, 2]);
    assert_eq!(result.stats.truncated_frames(), 1);
    assert!(result.is_complete());
}

#[test]
fn test_truncated_resend_reply_not_recovered() {
    let exchange = MockExchange::streaming(&[rec(1), rec(3)]).on_resend_raw(2, vec![0u8; 5]);
    let (result, _) = reconcile(exchange, ResendPolicy::default());

    assert_eq!(sequences(&result), vec![1, 3]);
    assert_eq!(result.stats.truncated_frames(), 1);
    assert_eq!(result.outcome.missing_ranges(), vec![(2, 2)]);
}

#[test]
fn test_gaps_above_limit_are_not_requested() {
    let exchange = MockExchange::streaming(&[rec(1), rec(254), rec(258)])
        .on_resend(2, rec(2));
    let (result, exchange) = reconcile(exchange, ResendPolicy::default());

    let requested = exchange.resend_requests();
    assert_eq!(requested.first(), Some(&2));
    assert_eq!(requested.last(), Some(&255));
    assert_eq!(requested.len(), 253); // 2..=253 and 255

    match result.outcome {
        Outcome::Partial { unrequestable, .. } => assert_eq!(unrequestable, vec![(256, 257)]),
        Outcome::Complete => panic!("expected partial outcome"),
    }
}

#[test]
fn test_max_sequence_stream_is_bounded() {
    let exchange = MockExchange::streaming(&[rec(1), rec(u32::MAX)]);
    let (result, exchange) = reconcile(exchange, ResendPolicy::default());

    assert_eq!(exchange.resend_requests(), (2..=255).collect::<Vec<u8>>());
    assert_eq!(sequences(&result), vec![1, u32::MAX]);
    assert_eq!(result.stats.gaps_detected(), u32::MAX as u64 - 2);
    assert_eq!(result.outcome.unrequestable_count(), u32::MAX as u64 - 256);
    match result.outcome {
        Outcome::Partial { unrecovered, unrequestable } => {
            assert_eq!(unrecovered.len(), 254);
            assert_eq!(unrequestable, vec![(256, u32::MAX - 1)]);
        }
        Outcome::Complete => panic!("expected partial outcome"),
    }
}

#[test]
fn test_overlong_resend_reply_does_not_desync() {
    let mut reply = rec(2).encode().to_vec();
    reply.extend_from_slice(&[0xEE; 3]);
    let exchange = MockExchange::streaming(&[rec(1), rec(4), rec(5)])
        .on_resend_raw(2, reply)
        .on_resend(3, rec(3));
    let (result, exchange) = reconcile(exchange, ResendPolicy::default());

    assert_eq!(exchange.resend_requests(), vec![2, 3]);
    assert_eq!(sequences(&result), vec![1, 2, 3, 4, 5]);
    assert_eq!(result.records.get(3), Some(&rec(3)));
    assert!(result.is_complete());
    assert_eq!(result.stats.stale_bytes(), 3);
    assert_eq!(result.stats.rejected_replies(), 0);
}

#[test]
fn test_reply_beyond_drained_range_is_rejected() {
    let exchange = MockExchange::streaming(&[rec(1), rec(3)]).on_resend(2, rec(999));
    let (result, _) = reconcile(exchange, ResendPolicy::default());

    assert_eq!(sequences(&result), vec![1, 3]);
    assert!(!result.records.contains(999));
    assert_eq!(result.stats.rejected_replies(), 1);
    assert_eq!(result.outcome.missing_ranges(), vec![(2, 2)]);
}

#[test]
fn test_phases_run_separately() {
    let exchange = MockExchange::streaming(&[rec(2)]).on_resend(1, rec(1));
    let mut reconciler = Reconciler::new(Session::new(exchange), ResendPolicy::default());
    let mut ctx = ReconcileContext::new();

    reconciler.drain(&mut ctx).unwrap();
    assert_eq!(ctx.records.len(), 1);

    let gaps: Vec<u32> = ctx.compute_gaps().iter().collect();
    assert_eq!(gaps, vec![1]);

    reconciler.backfill(&mut ctx);
    let result = ctx.finish();
    assert_eq!(result.records.sequences().collect::<Vec<_>>(), vec![1, 2]);
    assert!(result.is_complete());
}

proptest! {
    #[test]
    fn prop_backfill_restores_full_range(
        held in prop::collection::btree_set(1u32..=200, 1..60),
    ) {
        let max = *held.iter().next_back().unwrap();
        let drained: Vec<_> = held.iter().map(|&s| rec(s)).collect();
        let mut exchange = MockExchange::streaming(&drained);
        for seq in 1..=max {
            exchange = exchange.on_resend(seq as u8, rec(seq));
        }

        let (result, exchange) = reconcile(exchange, ResendPolicy::default());

        let expected_gaps: Vec<u8> = (1..=max).filter(|s| !held.contains(s)).map(|s| s as u8).collect();
        prop_assert_eq!(exchange.resend_requests(), expected_gaps);
        prop_assert_eq!(sequences(&result), (1..=max).collect::<Vec<_>>());
        prop_assert!(result.is_complete());
    }

    #[test]
    fn prop_output_strictly_ascending(
        seqs in prop::collection::vec(0u32..1000, 0..80),
    ) {
        let drained: Vec<_> = seqs.iter().map(|&s| rec(s)).collect();
        let (result, _) = reconcile(MockExchange::streaming(&drained), ResendPolicy::default());

        let out: Vec<u32> = project(&result.records)
            .iter()
            .map(|r| r.sequence.parse().unwrap())
            .collect();
        prop_assert!(out.windows(2).all(|w| w[0] < w[1]));
        let unique: BTreeSet<u32> = seqs.into_iter().collect();
        prop_assert_eq!(out, unique.into_iter().collect::<Vec<_>>());
    }
}
