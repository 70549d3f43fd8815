// Matching & scoring: semantic lookups, gap analysis, fit scores, batch scoring.
// Every weight and threshold lives in `policy::ScoringPolicy`.

pub mod batch;
pub mod fit_scoring;
pub mod gaps;
pub mod handlers;
pub mod policy;
pub mod semantic;
