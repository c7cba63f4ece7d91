//! The platform signature-assessment collaborator.
//!
//! Gatewatch never validates signatures itself; it asks the system policy
//! assessor (`spctl`) and consumes the originator identity it reports.

pub mod gatekeeper;

pub use gatekeeper::{Assessment, AssessmentMode, Assessor, SpctlAssessor, ORIGINATOR_KEY};
