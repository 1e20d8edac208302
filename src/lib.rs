// src/lib.rs

pub mod accessors;
pub mod cli;
pub mod constants;
pub mod errors;
pub mod matching;
pub mod models;
pub mod operations;
pub mod orchestrator;
pub mod profile;
pub mod report;
pub mod snapshot;
#[cfg(windows)]
pub mod utils;
