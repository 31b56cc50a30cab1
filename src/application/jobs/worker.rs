//! Background loop driving the reconciler on a fixed period.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::reconcile::Reconciler;

/// Owner of a running reconciliation worker.
pub struct ReconcilerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Ask the worker to stop and wait for it. A cycle already in progress runs
    /// to completion first.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(err) = self.task.await {
            error!(
                target = "kudos::reconcile",
                error = %err,
                "reconciler task ended abnormally"
            );
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Start a worker that runs one cycle every `period`. The first cycle runs one
/// full period after spawn; cycles never overlap.
pub fn spawn_reconciler(reconciler: Arc<Reconciler>, period: Duration) -> ReconcilerHandle {
    let (stop, mut stopped) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        info!(
            target = "kudos::reconcile",
            period_secs = period.as_secs_f64(),
            "reconciler started"
        );

        loop {
            tokio::select! {
                biased;
                changed = stopped.changed() => {
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    if let Err(err) = reconciler.run_cycle().await {
                        error!(
                            target = "kudos::reconcile",
                            error = %err,
                            "reconciliation cycle aborted"
                        );
                    }
                }
            }
        }

        info!(target = "kudos::reconcile", "reconciler stopped");
    });

    ReconcilerHandle { stop, task }
}
