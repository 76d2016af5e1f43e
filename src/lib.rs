//! RACESCAN: multi-source race listing aggregator
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod storage;
pub mod sources;
pub mod normalize;
pub mod engine;
pub mod strategy;
