pub mod event;
pub mod queue;
pub mod cache;
pub mod stats;
pub mod feed;

// Re-exports for convenience
pub use event::*;
pub use queue::*;
pub use cache::*;
pub use stats::*;
pub use feed::*;
