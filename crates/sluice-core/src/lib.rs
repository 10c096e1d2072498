//! sluice-core — shared types and configuration.
//! The channel and the copy tool both depend on this crate.

pub mod chunk;
pub mod config;

pub use chunk::{Chunk, Measure};
pub use config::SluiceConfig;
