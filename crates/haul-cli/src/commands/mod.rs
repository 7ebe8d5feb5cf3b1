//! Command implementations for the Haul CLI.
//!
//! - [`start`] - Development server with rebuild on change

pub mod start;

pub use start::execute as start_execute;
