//! Command handlers.
//!
//! Each handler is a thin wrapper: read input, drive the engine or the
//! catalogue, and format the result for the terminal. Engine wiring comes
//! from [`crate::bootstrap`].

pub mod sentences;
pub mod speak;
pub mod voices;
