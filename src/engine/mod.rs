//! Scan engine: fetch scheduling with retry, manual fallback, cross-source
//! merging and the pipeline that ties them together.

pub mod aggregator;
pub mod fallback;
pub mod pipeline;
pub mod retry;
pub mod scheduler;

pub use aggregator::aggregate;
pub use fallback::{ManualFallback, StdinFallback};
pub use pipeline::Pipeline;
pub use scheduler::FetchScheduler;
