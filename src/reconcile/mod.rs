//! The reconciliation state machine.
//!
//! For each target the engine resolves a store key, asks the assessment
//! collaborator for the current originator, compares it against the stored
//! expectation, and decides: create, confirm, warn-and-update, or fail.

pub mod engine;

pub use engine::{ReconcileOptions, Reconciler, RunReport, TargetOutcome};
