//! Folds buffered like deltas into the durable store.
//!
//! A pending key is deleted only after its delta has been applied. If that
//! delete fails the key survives and a later cycle applies the same delta again;
//! delivery is best-effort, not exactly-once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::application::deadline::{DeadlineExceeded, with_deadline};
use crate::application::likes::LikeError;
use crate::application::repos::ArticleCountsRepo;
use crate::cache::CounterCache;
use crate::domain::articles::{ARTICLE_KEY_PREFIX, ArticleId, PENDING_KEY_SUFFIX, parse_counter};

const METRIC_APPLIED: &str = "kudos_reconcile_applied_total";
const METRIC_FAILED: &str = "kudos_reconcile_failed_total";
const METRIC_MALFORMED: &str = "kudos_reconcile_malformed_total";
const METRIC_CYCLE_MS: &str = "kudos_reconcile_cycle_ms";

/// Tally of one reconciliation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Pending-delta keys found by the scan.
    pub scanned: usize,
    /// Deltas added to the durable store and cleared.
    pub applied: usize,
    /// Keys holding zero, deleted without a durable call.
    pub zero: usize,
    /// Keys that vanished between the scan and the read.
    pub skipped: usize,
    /// Keys whose article no longer exists; deleted.
    pub orphaned: usize,
    /// Keys holding a non-integer; left in place.
    pub malformed: usize,
    /// Keys whose read, apply, or delete failed; left for the next cycle.
    pub failed: usize,
}

impl ReconcileReport {
    fn record(&mut self, outcome: KeyOutcome) {
        match outcome {
            KeyOutcome::Applied => self.applied += 1,
            KeyOutcome::Zero => self.zero += 1,
            KeyOutcome::Skipped => self.skipped += 1,
            KeyOutcome::Orphaned => self.orphaned += 1,
            KeyOutcome::Malformed => self.malformed += 1,
            KeyOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOutcome {
    Applied,
    Zero,
    Skipped,
    Orphaned,
    Malformed,
    Failed,
}

pub struct Reconciler {
    counts: Arc<dyn ArticleCountsRepo>,
    cache: Arc<dyn CounterCache>,
    operation_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        counts: Arc<dyn ArticleCountsRepo>,
        cache: Arc<dyn CounterCache>,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            counts,
            cache,
            operation_timeout,
        }
    }

    /// Run one pass over every pending delta currently buffered.
    ///
    /// Only the initial scan can fail the cycle; per-key failures are counted in
    /// the report and the pass moves on.
    pub async fn run_cycle(&self) -> Result<ReconcileReport, LikeError> {
        let started_at = Instant::now();

        let keys = with_deadline(
            self.operation_timeout,
            "cache.keys_matching",
            self.cache
                .keys_matching(ARTICLE_KEY_PREFIX, PENDING_KEY_SUFFIX),
        )
        .await??;

        let mut report = ReconcileReport::default();
        for key in keys {
            let Some(article_id) = ArticleId::from_pending_key(&key) else {
                continue;
            };
            report.scanned += 1;
            let outcome = self.reconcile_key(&key, &article_id).await;
            report.record(outcome);
        }

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_CYCLE_MS).record(elapsed_ms);
        counter!(METRIC_APPLIED).increment(report.applied as u64);
        counter!(METRIC_FAILED).increment(report.failed as u64);
        counter!(METRIC_MALFORMED).increment(report.malformed as u64);

        if report.scanned > 0 {
            info!(
                target = "kudos::reconcile",
                scanned = report.scanned,
                applied = report.applied,
                zero = report.zero,
                skipped = report.skipped,
                orphaned = report.orphaned,
                malformed = report.malformed,
                failed = report.failed,
                elapsed_ms,
                "reconciliation cycle finished"
            );
        } else {
            debug!(target = "kudos::reconcile", "no pending deltas");
        }

        Ok(report)
    }

    async fn reconcile_key(&self, key: &str, article_id: &ArticleId) -> KeyOutcome {
        let read = with_deadline(self.operation_timeout, "cache.get", self.cache.get(key)).await;
        let raw = match settle(read) {
            Ok(Some(raw)) => raw,
            Ok(None) => return KeyOutcome::Skipped,
            Err(err) => {
                warn!(
                    target = "kudos::reconcile",
                    key,
                    error = %err,
                    "failed to read pending delta"
                );
                return KeyOutcome::Failed;
            }
        };

        let delta = match parse_counter(key, &raw) {
            Ok(delta) => delta,
            Err(err) => {
                error!(
                    target = "kudos::reconcile",
                    key,
                    value = %raw,
                    error = %err,
                    "pending delta is not an integer; leaving key in place"
                );
                return KeyOutcome::Malformed;
            }
        };

        let outcome = if delta == 0 {
            KeyOutcome::Zero
        } else {
            let applied = with_deadline(
                self.operation_timeout,
                "store.add_delta",
                self.counts.add_delta(article_id, delta),
            )
            .await;
            match settle(applied) {
                Ok(true) => KeyOutcome::Applied,
                Ok(false) => {
                    warn!(
                        target = "kudos::reconcile",
                        article_id = %article_id,
                        delta,
                        "article no longer exists; discarding pending delta"
                    );
                    KeyOutcome::Orphaned
                }
                Err(err) => {
                    warn!(
                        target = "kudos::reconcile",
                        article_id = %article_id,
                        delta,
                        error = %err,
                        "failed to apply pending delta"
                    );
                    return KeyOutcome::Failed;
                }
            }
        };

        let deleted = with_deadline(self.operation_timeout, "cache.delete", self.cache.delete(key)).await;
        if let Err(err) = settle(deleted) {
            error!(
                target = "kudos::reconcile",
                key,
                delta,
                error = %err,
                "pending delta handled but key not cleared; a later cycle will apply it again"
            );
            return KeyOutcome::Failed;
        }

        debug!(
            target = "kudos::reconcile",
            article_id = %article_id,
            delta,
            ?outcome,
            "pending delta cleared"
        );
        outcome
    }
}

fn settle<T, E>(outcome: Result<Result<T, E>, DeadlineExceeded>) -> Result<T, LikeError>
where
    LikeError: From<E>,
{
    Ok(outcome??)
}
