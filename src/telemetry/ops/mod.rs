pub mod ingest;
pub mod report;
