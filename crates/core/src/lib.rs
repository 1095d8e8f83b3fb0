//! gitpulse Core - Pure domain logic with no external dependencies
//!
//! This crate contains the bounded event cache, the merge protocol that folds
//! freshly fetched events into it, the gap statistics, and the ports
//! (interfaces) for the event source, snapshot storage and the clock.
//! Network access and file handling live in the adapters of the app crate.

pub mod domain;
pub mod ports;
pub mod error;

// Re-exports for ergonomics
pub use domain::*;
pub use error::*;
