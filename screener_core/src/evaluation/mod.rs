//! Evaluator: one paced model call per candidate, tolerant extraction of the JSON
//! verdict from free text, and validation against `EvaluationResult`.

pub mod engine;
pub mod extract;
pub mod pacing;
pub mod rubric;
pub mod traits;
