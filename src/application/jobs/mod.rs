mod reconcile;
mod worker;

pub use reconcile::{ReconcileReport, Reconciler};
pub use worker::{ReconcilerHandle, spawn_reconciler};
