//! Strategy: race value scoring and ranking.

pub mod scoring;

pub use scoring::{ScoringEngine, ScoringWeights};
