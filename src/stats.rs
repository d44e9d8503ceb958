/// Reconciliation statistics
///
/// Counts what happened in each phase of a run: frames drained, malformed
/// frames, resend traffic and recovered/unrecovered gaps.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct ReconcileStats {
    start_time: Option<Instant>,
    finish_time: Option<Instant>,

    // Draining
    frames_drained: u64,
    bytes_received: u64,
    truncated_frames: u32,

    // Integrity
    divergent_duplicates: u32,
    rejected_replies: u32,
    stale_bytes: u64,

    // Backfilling
    gaps_detected: u64,
    resend_requests: u32,
    gaps_recovered: u32,
    gaps_unrecovered: u32,
    gaps_unrequestable: u64,
}

impl ReconcileStats {
    pub fn new() -> Self {
        ReconcileStats::default()
    }

    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        self.finish_time = None;
    }

    pub fn finish(&mut self) {
        self.finish_time = Some(Instant::now());
    }

    pub fn record_frame(&mut self, size: usize) {
        self.frames_drained += 1;
        self.bytes_received += size as u64;
    }

    pub fn record_resend_frame(&mut self, size: usize) {
        self.bytes_received += size as u64;
    }

    pub fn record_truncated(&mut self) {
        self.truncated_frames += 1;
    }

    pub fn record_divergent(&mut self) {
        self.divergent_duplicates += 1;
    }

    /// Resend reply for a sequence past the drained maximum, not stored
    pub fn record_rejected(&mut self) {
        self.rejected_replies += 1;
    }

    pub fn record_stale(&mut self, bytes: usize) {
        self.stale_bytes += bytes as u64;
    }

    pub fn record_gaps(&mut self, detected: u64, unrequestable: u64) {
        self.gaps_detected = detected;
        self.gaps_unrequestable = unrequestable;
    }

    pub fn record_resend_request(&mut self) {
        self.resend_requests += 1;
    }

    pub fn record_recovered(&mut self) {
        self.gaps_recovered += 1;
    }

    pub fn record_unrecovered(&mut self) {
        self.gaps_unrecovered += 1;
    }

    /// Wall time from `start` to `finish` (or now, if still running)
    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|st| match self.finish_time {
            Some(end) => end.duration_since(st),
            None => st.elapsed(),
        })
    }

    pub fn frames_drained(&self) -> u64 {
        self.frames_drained
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn truncated_frames(&self) -> u32 {
        self.truncated_frames
    }

    pub fn divergent_duplicates(&self) -> u32 {
        self.divergent_duplicates
    }

    pub fn rejected_replies(&self) -> u32 {
        self.rejected_replies
    }

    pub fn stale_bytes(&self) -> u64 {
        self.stale_bytes
    }

    pub fn gaps_detected(&self) -> u64 {
        self.gaps_detected
    }

    pub fn resend_requests(&self) -> u32 {
        self.resend_requests
    }

    pub fn gaps_recovered(&self) -> u32 {
        self.gaps_recovered
    }

    pub fn gaps_unrecovered(&self) -> u32 {
        self.gaps_unrecovered
    }

    pub fn gaps_unrequestable(&self) -> u64 {
        self.gaps_unrequestable
    }

    /// One-line summary for the end-of-run log
    pub fn summary(&self) -> String {
        format!(
            "drained {} frames ({} bytes, {} truncated), {} gaps: {} recovered, {} unrecovered, {} unrequestable, {} resend requests, {} rejected replies, {} stale bytes, {} divergent duplicates, elapsed {:?}",
            self.frames_drained,
            self.bytes_received,
            self.truncated_frames,
            self.gaps_detected,
            self.gaps_recovered,
            self.gaps_unrecovered,
            self.gaps_unrequestable,
            self.resend_requests,
            self.rejected_replies,
            self.stale_bytes,
            self.divergent_duplicates,
            self.elapsed().unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_frame() {
        let mut stats = ReconcileStats::new();
        stats.record_frame(17);
        stats.record_frame(17);
        assert_eq!(stats.frames_drained(), 2);
        assert_eq!(stats.bytes_received(), 34);
    }

    #[test]
    fn test_resend_frames_count_bytes_only() {
        let mut stats = ReconcileStats::new();
        stats.record_resend_frame(17);
        assert_eq!(stats.frames_drained(), 0);
        assert_eq!(stats.bytes_received(), 17);
    }

    #[test]
    fn test_gap_counters() {
        let mut stats = ReconcileStats::new();
        stats.record_gaps(5, 1);
        stats.record_resend_request();
        stats.record_recovered();
        stats.record_unrecovered();
        assert_eq!(stats.gaps_detected(), 5);
        assert_eq!(stats.gaps_unrequestable(), 1);
        assert_eq!(stats.resend_requests(), 1);
        assert_eq!(stats.gaps_recovered(), 1);
        assert_eq!(stats.gaps_unrecovered(), 1);
    }

    #[test]
    fn test_gap_counters_exceed_u32() {
        let mut stats = ReconcileStats::new();
        let detected = u32::MAX as u64 - 2;
        stats.record_gaps(detected, detected - 254);
        assert_eq!(stats.gaps_detected(), detected);
        assert_eq!(stats.gaps_unrequestable(), detected - 254);
    }

    #[test]
    fn test_rejected_and_stale() {
        let mut stats = ReconcileStats::new();
        stats.record_rejected();
        stats.record_stale(3);
        stats.record_stale(5);
        assert_eq!(stats.rejected_replies(), 1);
        assert_eq!(stats.stale_bytes(), 8);
        assert!(stats.summary().contains("1 rejected replies"));
    }

    #[test]
    fn test_elapsed() {
        let mut stats = ReconcileStats::new();
        assert!(stats.elapsed().is_none());
        stats.start();
        stats.finish();
        assert!(stats.elapsed().is_some());
    }
}
