/// Gap recovery through per-sequence resend requests
///
/// A run moves through four phases, carrying its state in a `ReconcileContext`:
///
/// - Draining: send one stream-all request and read frames until quiescence
/// - GapComputing: snapshot the sequences missing from `1..=max`
/// - Backfilling: request each requestable gap in ascending order
/// - Done: the record set is final
///
/// Per-record failures never abort a run. Only a failed stream-all request is
/// surfaced to the caller; everything else ends up in the `Outcome`.

use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::decoder::{Decoder, Record};
use crate::gap_detector::{range_count, GapDetector, GapSet};
use crate::protocol::{MAX_RESEND_SEQUENCE, RECORD_SIZE};
use crate::record_set::{Insert, RecordSet};
use crate::session::{FrameRead, Session, SessionResult, Transport};
use crate::stats::ReconcileStats;

/// How hard to try for each missing sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendPolicy {
    /// Requests per gap, at least one
    pub attempts: u32,
    /// Pause before each retry
    pub backoff: Duration,
}

impl ResendPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        ResendPolicy {
            attempts: attempts.max(1),
            backoff,
        }
    }
}

impl Default for ResendPolicy {
    fn default() -> Self {
        ResendPolicy {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Draining,
    GapComputing,
    Backfilling,
    Done,
}

/// Whether every sequence in `1..=max` made it into the final set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Complete,
    Partial {
        /// Requested but never answered with the right record
        unrecovered: Vec<u32>,
        /// Inclusive ranges above the resend parameter limit, never requested
        unrequestable: Vec<(u32, u32)>,
    },
}

impl Outcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete)
    }

    /// Sequences never requested because they exceed the resend limit
    pub fn unrequestable_count(&self) -> u64 {
        match self {
            Outcome::Complete => 0,
            Outcome::Partial { unrequestable, .. } => range_count(unrequestable),
        }
    }

    /// Total sequences still missing
    pub fn missing_count(&self) -> u64 {
        match self {
            Outcome::Complete => 0,
            Outcome::Partial { unrecovered, .. } => {
                unrecovered.len() as u64 + self.unrequestable_count()
            }
        }
    }

    /// Every sequence still missing, as ascending inclusive ranges
    pub fn missing_ranges(&self) -> Vec<(u32, u32)> {
        match self {
            Outcome::Complete => Vec::new(),
            Outcome::Partial {
                unrecovered,
                unrequestable,
            } => {
                let mut ranges: Vec<(u32, u32)> = Vec::new();
                let singles = unrecovered.iter().map(|&s| (s, s));
                let mut all: Vec<(u32, u32)> = singles.chain(unrequestable.iter().copied()).collect();
                all.sort_unstable();
                for (start, end) in all {
                    match ranges.last_mut() {
                        Some((_, last)) if last.saturating_add(1) >= start => {
                            *last = (*last).max(end);
                        }
                        _ => ranges.push((start, end)),
                    }
                }
                ranges
            }
        }
    }
}

/// State carried across phases
#[derive(Debug, Clone)]
pub struct ReconcileContext {
    pub records: RecordSet,
    pub gaps: GapSet,
    pub stats: ReconcileStats,
    phase: Phase,
    max_seen: Option<u32>,
    unrequestable: Vec<(u32, u32)>,
}

impl ReconcileContext {
    pub fn new() -> Self {
        ReconcileContext {
            records: RecordSet::new(),
            gaps: GapSet::default(),
            stats: ReconcileStats::new(),
            phase: Phase::Draining,
            max_seen: None,
            unrequestable: Vec::new(),
        }
    }

    /// Start from records gathered elsewhere, ready for gap computation
    pub fn with_records(records: RecordSet) -> Self {
        ReconcileContext {
            records,
            phase: Phase::GapComputing,
            ..ReconcileContext::new()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Highest sequence held when gaps were computed
    pub fn max_seen(&self) -> Option<u32> {
        self.max_seen
    }

    fn store(&mut self, record: Record) {
        if let Insert::Divergent { previous } = self.records.insert(record) {
            self.stats.record_divergent();
            warn!(
                sequence = record.sequence,
                ?previous,
                current = ?record,
                "divergent payload for sequence, keeping latest"
            );
        }
    }

    /// Phase: GapComputing. Pure over the held records.
    pub fn compute_gaps(&mut self) -> &GapSet {
        debug_assert_eq!(self.phase, Phase::GapComputing);

        self.max_seen = self.records.max_sequence();
        self.gaps = GapDetector::scan(&self.records);
        let unrequestable = self.gaps.above(MAX_RESEND_SEQUENCE);
        self.stats.record_gaps(self.gaps.len(), range_count(&unrequestable));

        if self.gaps.is_empty() {
            info!(max = ?self.max_seen, "no gaps detected");
        } else {
            info!(
                count = self.gaps.len(),
                ranges = self.gaps.ranges().len(),
                "gaps detected"
            );
        }
        for &(start, end) in &unrequestable {
            warn!(
                start,
                end,
                count = end - start + 1,
                limit = MAX_RESEND_SEQUENCE,
                "gap range cannot be re-requested: above resend parameter limit"
            );
        }

        self.unrequestable = unrequestable;
        self.phase = Phase::Backfilling;
        &self.gaps
    }

    /// Gap sequences that will be re-requested
    pub fn requestable_gaps(&self) -> Vec<u32> {
        self.gaps.at_or_below(MAX_RESEND_SEQUENCE)
    }

    /// Phase: Done. Seal the context into a result.
    pub fn finish(mut self) -> Reconciliation {
        self.phase = Phase::Done;
        self.stats.finish();
        info!("{}", self.stats.summary());

        let unrecovered: Vec<u32> = self
            .requestable_gaps()
            .into_iter()
            .filter(|&seq| !self.records.contains(seq))
            .collect();

        let outcome = if unrecovered.is_empty() && self.unrequestable.is_empty() {
            Outcome::Complete
        } else {
            Outcome::Partial {
                unrecovered,
                unrequestable: self.unrequestable,
            }
        };

        Reconciliation {
            records: self.records,
            outcome,
            stats: self.stats,
        }
    }
}

impl Default for ReconcileContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Final state of a run
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub records: RecordSet,
    pub outcome: Outcome,
    pub stats: ReconcileStats,
}

impl Reconciliation {
    pub fn is_complete(&self) -> bool {
        self.outcome.is_complete()
    }
}

/// Drives a session through drain, gap computation and backfill
pub struct Reconciler<T: Transport> {
    session: Session<T>,
    policy: ResendPolicy,
}

impl<T: Transport> Reconciler<T> {
    pub fn new(session: Session<T>, policy: ResendPolicy) -> Self {
        Reconciler { session, policy }
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn into_session(self) -> Session<T> {
        self.session
    }

    /// Run every phase to completion
    pub fn run(&mut self) -> SessionResult<Reconciliation> {
        let mut ctx = ReconcileContext::new();
        ctx.stats.start();

        self.drain(&mut ctx)?;
        ctx.compute_gaps();
        self.backfill(&mut ctx);

        Ok(ctx.finish())
    }

    /// Phase: Draining
    pub fn drain(&mut self, ctx: &mut ReconcileContext) -> SessionResult<()> {
        debug_assert_eq!(ctx.phase, Phase::Draining);

        self.session.request_stream_all()?;

        loop {
            match self.session.read_frame() {
                Ok(FrameRead::Frame(frame)) => {
                    let record = Decoder::decode_frame(&frame);
                    ctx.stats.record_frame(RECORD_SIZE);
                    info!(
                        sequence = record.sequence,
                        symbol = %record.symbol_str(),
                        "received record"
                    );
                    ctx.store(record);
                }
                Ok(FrameRead::Truncated(n)) => {
                    ctx.stats.record_truncated();
                    warn!(bytes = n, "stream ended mid-frame, discarding partial frame");
                    break;
                }
                Ok(FrameRead::Quiescent) => {
                    info!(records = ctx.records.len(), "no more data, stream drained");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "read failed while draining, treating as end of stream");
                    break;
                }
            }
        }

        ctx.phase = Phase::GapComputing;
        Ok(())
    }

    /// Phase: Backfilling
    pub fn backfill(&mut self, ctx: &mut ReconcileContext) {
        debug_assert_eq!(ctx.phase, Phase::Backfilling);

        for seq in ctx.requestable_gaps() {
            if ctx.records.contains(seq) {
                debug!(sequence = seq, "gap already filled by an earlier reply");
                ctx.stats.record_recovered();
                continue;
            }

            if self.resend(ctx, seq) {
                ctx.stats.record_recovered();
            } else {
                ctx.stats.record_unrecovered();
                warn!(sequence = seq, attempts = self.policy.attempts, "gap not recovered");
            }
        }

        ctx.phase = Phase::Done;
    }

    /// Request one sequence under the resend policy; true once it is held
    fn resend(&mut self, ctx: &mut ReconcileContext, seq: u32) -> bool {
        for attempt in 1..=self.policy.attempts.max(1) {
            if attempt > 1 && !self.policy.backoff.is_zero() {
                thread::sleep(self.policy.backoff);
            }

            match self.session.discard_pending() {
                Ok(0) => {}
                Ok(n) => {
                    ctx.stats.record_stale(n);
                    warn!(sequence = seq, bytes = n, "discarded stale bytes before resend");
                }
                Err(e) => warn!(sequence = seq, error = %e, "failed to discard stale bytes"),
            }

            ctx.stats.record_resend_request();
            if let Err(e) = self.session.request_resend(seq) {
                warn!(sequence = seq, attempt, error = %e, "resend request failed");
                continue;
            }

            match self.session.read_frame() {
                Ok(FrameRead::Frame(frame)) => {
                    let record = Decoder::decode_frame(&frame);
                    ctx.stats.record_resend_frame(RECORD_SIZE);
                    if ctx.max_seen.map_or(true, |max| record.sequence > max) {
                        ctx.stats.record_rejected();
                        warn!(
                            requested = seq,
                            received = record.sequence,
                            max = ?ctx.max_seen,
                            attempt,
                            "resend reply beyond drained range, not stored"
                        );
                        continue;
                    }
                    ctx.store(record);
                    if record.sequence == seq {
                        info!(
                            sequence = seq,
                            symbol = %record.symbol_str(),
                            "received missing record"
                        );
                        return true;
                    }
                    warn!(
                        requested = seq,
                        received = record.sequence,
                        attempt,
                        "resend answered with a different sequence"
                    );
                }
                Ok(FrameRead::Truncated(n)) => {
                    ctx.stats.record_truncated();
                    warn!(sequence = seq, attempt, bytes = n, "truncated resend reply discarded");
                }
                Ok(FrameRead::Quiescent) => {
                    debug!(sequence = seq, attempt, "no reply to resend request");
                }
                Err(e) => {
                    warn!(sequence = seq, attempt, error = %e, "read failed during resend");
                }
            }
        }

        ctx.records.contains(seq)
    }
}
