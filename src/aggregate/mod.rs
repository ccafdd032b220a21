//! Views derived from the full record history on every run.

pub mod actors;
pub mod stats;
