//! Shared types for the GNAF loader
//!
//! Error taxonomy and logging initialization used by the loader crates.

pub mod error;
pub mod logging;

pub use error::{GnafError, Result};
