pub mod compat;
pub mod engine;

pub use compat::{CompatibilityEvaluator, MatchPolicy};
pub use engine::{MatchDecision, MatchingEngine, RideWithCandidates, ScoredCandidate};
