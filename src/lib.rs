//! Gatewatch tracks the expected code-signing originator of application
//! paths and re-verifies them against the platform's assessment authority,
//! flagging drift between what was recorded and what is currently signed.

pub mod assess;
pub mod cli;
pub mod error;
pub mod reconcile;
pub mod store;

pub use error::{GatewatchError, Result};
