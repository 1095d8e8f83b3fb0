pub mod source;
pub mod snapshot;
pub mod time;

// Re-exports
pub use source::*;
pub use snapshot::*;
pub use time::*;
