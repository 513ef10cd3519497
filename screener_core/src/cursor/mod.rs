//! Cursor Tracker: durable pointer to the last source row handed to evaluation.
//!
//! The cursor is stored through a `CursorStorage` (durable scalar storage). The
//! default backend keeps it as a single plaintext integer in a well-known file.

pub mod file;
pub mod memory;
pub mod tracker;
pub mod traits;
