//! One screening tick end to end: token, read, cursor advance, paced evaluation,
//! append. Failures are classified by `FailureKind` and counted in a `TickReport`.

pub mod engine;
pub mod models;
