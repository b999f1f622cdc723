//! Command-line reader for `narrate-engine`.
//!
//! The binary in `main.rs` parses arguments, sets up logging and dispatches
//! to [`handlers`]. Engine wiring (synthesizer backend, output device,
//! configuration file) lives in [`bootstrap`].

#![deny(unused_crate_dependencies)]

// Used by the binary only
use dotenvy as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod input;
pub mod parser;

// Re-export primary types for convenient access
pub use commands::{Commands, SpeakArgs};
pub use error::CliError;
pub use parser::Cli;
