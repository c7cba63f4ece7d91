//! Persistent signature expectations.
//!
//! The store is a durable ordered mapping from a canonical path key to an
//! expectation record. It owns key resolution: the same target may be
//! spelled raw, normalized, tilde-relative or fully expanded across runs,
//! and all spellings must land on one record.

pub mod keys;
pub mod manager;
pub mod types;

pub use manager::{ExpectationStore, Resolution};
pub use types::{ExpectationRecord, OriginatorPattern};
