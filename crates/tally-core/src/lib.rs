//! Core of the `tally` test runner: test discovery, the agent backend client,
//! the run orchestrator and the tabular verification engine.

pub mod case;
pub mod client;
pub mod config;
pub mod engine;
pub mod model;
pub mod report;
pub mod verify;
