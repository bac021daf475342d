//! Command implementations.

pub mod complete;
pub mod providers;
