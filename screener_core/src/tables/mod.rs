//! Tabular data source/sink seams and the components built on them.
//!
//! - `SourceReader` pulls the unconsumed suffix of the source table as candidate records.
//! - `SinkWriter` appends validated results to the destination table.

pub mod memory;
pub mod reader;
pub mod traits;
pub mod writer;
