//! GNAF Ingest Library
//!
//! Bulk-loads the G-NAF national address dataset into PostgreSQL and
//! optionally derives a flat, search-optimized address table.
//!
//! # Pipeline
//!
//! - **Schema**: executes the distribution's table-creation, constraint and
//!   view scripts verbatim
//! - **Bulk load**: streams every PSV file into its destination table over
//!   the COPY protocol
//! - **Flat mode**: materializes `national_address_list`, formats one
//!   autocomplete string per address, trigram-indexes it and drops the
//!   normalized tables
//!
//! # Example
//!
//! ```no_run
//! use gnaf_ingest::{Config, Mode, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let report = Pipeline::new(config, Mode::Flat).run().await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod copy;
pub mod db;
pub mod format;
pub mod pipeline;
pub mod reader;
pub mod schema;
pub mod tables;
pub mod transform;

// Re-exports for convenient access
pub use config::Config;
pub use format::{autocomplete, AddressParts};
pub use pipeline::{Mode, Pipeline, PipelineReport};
pub use transform::{TransformStats, REGIONS};
