//! Subcommand implementations for the `conduit` binary.

pub mod audit;
pub mod ingest;
pub mod serve;
