//! Import pipeline orchestration
//!
//! Linear state machine: create database → create tables → bulk load →
//! constraints → view → mode branch (raw indexes, or flat table + formatting
//! + trigram index + legacy drop) → vacuum. Every transition is
//! fatal-on-error with no retry and no rollback; a restart begins from
//! scratch against a fresh database. Each phase opens its own connection
//! pool and closes it before the next phase starts, so no idle session sits
//! open across a long bulk operation.

use std::time::{Duration, Instant};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::config::Config;
use crate::copy::BulkIngestor;
use crate::db;
use crate::schema::SchemaScripts;
use crate::tables::{self, AUTHORITY_TABLES, STANDARD_TABLES};
use crate::transform::{TransformDriver, TransformStats, FLAT_TABLE};

/// Output mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Keep the normalized schema and add the standard indexes
    Raw,
    /// Materialize one denormalized searchable table and drop the rest
    #[default]
    Flat,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Raw => f.write_str("raw"),
            Mode::Flat => f.write_str("flat"),
        }
    }
}

/// Pipeline states, in transition order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    SchemaCreated,
    DataLoaded,
    ConstraintsApplied,
    ViewBuilt,
    RawIndexed,
    FlatMaterialized,
    FlatIndexed,
    LegacyDropped,
    Vacuumed,
}

/// The 13 single-column indexes built in raw mode
const RAW_INDEXES: &[(&str, &str, &str)] = &[
    ("address_detail_flat_type_code", "address_detail", "flat_type_code"),
    ("address_detail_level_type_code", "address_detail", "level_type_code"),
    ("address_detail_street_locality_pid", "address_detail", "street_locality_pid"),
    ("street_locality_street_locality_pid", "street_locality", "street_locality_pid"),
    ("street_locality_street_suffix_code", "street_locality", "street_suffix_code"),
    ("street_locality_street_class_code", "street_locality", "street_class_code"),
    ("locality_locality_pid", "locality", "locality_pid"),
    ("address_detail_locality_pid", "address_detail", "locality_pid"),
    ("address_default_geocode_address_detail_pid", "address_default_geocode", "address_detail_pid"),
    ("address_detail_address_detail_pid", "address_detail", "address_detail_pid"),
    ("address_default_geocode_geocode_type_code", "address_default_geocode", "geocode_type_code"),
    ("address_detail_level_geocoded_code", "address_detail", "level_geocoded_code"),
    ("locality_state_pid", "locality", "state_pid"),
];

/// The denormalized projection behind the flat table
///
/// Numeric source columns are cast to text on the way in; the formatter
/// treats every value as an opaque token.
const FLAT_TABLE_SELECT: &str = "\
    SELECT ad.address_detail_pid, \
           ad.building_name, \
           ad.flat_type_code AS flat_type, \
           ad.flat_number_prefix, \
           ad.flat_number::text AS flat_number, \
           ad.flat_number_suffix, \
           ad.level_type_code AS level_type, \
           ad.level_number::text AS level_number, \
           ad.number_first::text AS number_first, \
           ad.number_first_suffix, \
           ad.number_last::text AS number_last, \
           ad.number_last_suffix, \
           sl.street_name, \
           sl.street_type_code AS street_type, \
           loc.locality_name, \
           st.state_abbreviation, \
           ad.postcode, \
           adg.latitude, \
           adg.longitude, \
           NULL::text AS autocomplete \
    FROM address_detail ad \
    LEFT JOIN street_locality sl ON sl.street_locality_pid = ad.street_locality_pid \
    JOIN locality loc ON loc.locality_pid = ad.locality_pid \
    JOIN state st ON st.state_pid = loc.state_pid \
    LEFT JOIN address_default_geocode adg ON adg.address_detail_pid = ad.address_detail_pid";

/// The whole import run
pub struct Pipeline {
    config: Config,
    mode: Mode,
}

impl Pipeline {
    pub fn new(config: Config, mode: Mode) -> Self {
        Self { config, mode }
    }

    /// Run every phase to completion
    pub async fn run(&self) -> anyhow::Result<PipelineReport> {
        let started = Instant::now();
        info!(mode = %self.mode, "Starting G-NAF import");

        // Discovery runs before anything touches the database, so an
        // unrecognized file aborts the run while the store is still empty.
        let files = tables::discover(&self.config.data)?;
        if files.is_empty() {
            anyhow::bail!(
                "No input files found under {}",
                self.config.data.data_dir.display()
            );
        }
        info!(files = files.len(), "Discovered input files");

        self.create_database().await?;
        self.completed(Phase::Init);

        let scripts = SchemaScripts::from_config(&self.config.data);

        info!("Creating tables");
        {
            let pool = self.connect().await?;
            let result = scripts.create_tables(&pool).await;
            pool.close().await;
            result?;
        }
        self.completed(Phase::SchemaCreated);

        info!("Importing data files");
        let rows_copied = self.load_files(&files).await?;
        self.completed(Phase::DataLoaded);

        info!("Applying foreign key constraints");
        {
            let pool = self.connect().await?;
            let result = scripts.apply_constraints(&pool).await;
            pool.close().await;
            result?;
        }
        self.completed(Phase::ConstraintsApplied);

        info!("Building address view");
        {
            let pool = self.connect().await?;
            let result = scripts.build_view(&pool).await;
            pool.close().await;
            result?;
        }
        self.completed(Phase::ViewBuilt);

        let transform = match self.mode {
            Mode::Raw => {
                info!("Building indexes");
                self.build_raw_indexes().await?;
                self.completed(Phase::RawIndexed);
                None
            },
            Mode::Flat => Some(self.build_flat_table().await?),
        };

        info!("Vacuuming and analyzing");
        {
            let pool = self.connect().await?;
            // VACUUM cannot run inside a transaction block; raw_sql executes
            // it as a simple autocommit statement.
            let result = sqlx::raw_sql("VACUUM ANALYZE")
                .execute(&pool)
                .await
                .context("Failed to vacuum database");
            pool.close().await;
            result?;
        }
        self.completed(Phase::Vacuumed);

        Ok(PipelineReport {
            mode: self.mode,
            files_loaded: files.len(),
            rows_copied,
            transform,
            elapsed: started.elapsed(),
        })
    }

    fn completed(&self, phase: Phase) {
        debug!(phase = ?phase, "Phase complete");
    }

    async fn connect(&self) -> anyhow::Result<PgPool> {
        db::connect(&self.config.database).await
    }

    async fn create_database(&self) -> anyhow::Result<()> {
        info!(database = %self.config.database.database, "Creating database");
        let admin = db::connect_admin(&self.config.database)
            .await
            .context("Failed to connect to PostgreSQL server")?;
        let result = db::create_database(&admin, &self.config.database.database)
            .await
            .context("Failed to create target database (it must not already exist)");
        admin.close().await;
        result
    }

    async fn load_files(&self, files: &[tables::DataFile]) -> anyhow::Result<u64> {
        let pool = self.connect().await?;
        let ingestor = BulkIngestor::new(&pool);

        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );

        let mut rows_copied = 0;
        for file in files {
            bar.set_message(file.file_name().to_string());
            match ingestor.load_file(file).await {
                Ok(rows) => rows_copied += rows,
                Err(e) => {
                    bar.abandon();
                    pool.close().await;
                    return Err(e);
                },
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        pool.close().await;
        Ok(rows_copied)
    }

    async fn build_raw_indexes(&self) -> anyhow::Result<()> {
        let pool = self.connect().await?;
        for (name, table, column) in RAW_INDEXES {
            debug!(index = name, "Creating index");
            let result = sqlx::query(&format!("CREATE INDEX {} ON {} ({})", name, table, column))
                .execute(&pool)
                .await
                .with_context(|| format!("Failed to create index {}", name));
            if let Err(e) = result {
                pool.close().await;
                return Err(e);
            }
        }
        pool.close().await;
        Ok(())
    }

    async fn build_flat_table(&self) -> anyhow::Result<TransformStats> {
        info!(table = FLAT_TABLE, "Materializing flat address table");
        {
            let pool = self.connect().await?;
            let result = self.materialize(&pool).await;
            pool.close().await;
            result?;
        }
        self.completed(Phase::FlatMaterialized);

        info!("Formatting autocomplete strings");
        let stats = {
            let pool = self.connect().await?;
            let driver = TransformDriver::new(&pool, self.config.transform.fetch_batch_size);
            let result = driver.run().await;
            pool.close().await;
            result?
        };
        info!("{}", stats.summary());

        info!("Building trigram index");
        {
            let pool = self.connect().await?;
            let result = self.index_flat_table(&pool).await;
            pool.close().await;
            result?;
        }
        self.completed(Phase::FlatIndexed);

        info!("Dropping normalized tables");
        {
            let pool = self.connect().await?;
            let result = self.drop_legacy(&pool).await;
            pool.close().await;
            result?;
        }
        self.completed(Phase::LegacyDropped);

        Ok(stats)
    }

    async fn materialize(&self, pool: &PgPool) -> anyhow::Result<()> {
        sqlx::query(&format!("CREATE TABLE {} AS {}", FLAT_TABLE, FLAT_TABLE_SELECT))
            .execute(pool)
            .await
            .context("Failed to materialize flat table")?;

        sqlx::query(&format!(
            "ALTER TABLE {} ADD PRIMARY KEY (address_detail_pid)",
            FLAT_TABLE
        ))
        .execute(pool)
        .await
        .context("Failed to add flat table primary key")?;

        Ok(())
    }

    async fn index_flat_table(&self, pool: &PgPool) -> anyhow::Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS pg_trgm")
            .execute(pool)
            .await
            .context("Failed to create pg_trgm extension")?;

        sqlx::query(&format!(
            "CREATE INDEX {}_autocomplete ON {} USING gin (autocomplete gin_trgm_ops)",
            FLAT_TABLE, FLAT_TABLE
        ))
        .execute(pool)
        .await
        .context("Failed to create trigram index")?;

        Ok(())
    }

    async fn drop_legacy(&self, pool: &PgPool) -> anyhow::Result<()> {
        sqlx::query("DROP VIEW IF EXISTS address_view")
            .execute(pool)
            .await
            .context("Failed to drop address view")?;

        for table in STANDARD_TABLES.iter().chain(AUTHORITY_TABLES) {
            sqlx::query(&format!("DROP TABLE IF EXISTS {} CASCADE", table))
                .execute(pool)
                .await
                .with_context(|| format!("Failed to drop table {}", table))?;
        }

        Ok(())
    }
}

/// Result of one import run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub mode: Mode,
    pub files_loaded: usize,
    pub rows_copied: u64,
    pub transform: Option<TransformStats>,
    pub elapsed: Duration,
}

impl PipelineReport {
    /// Human-readable completion message
    pub fn summary(&self) -> String {
        let minutes = self.elapsed.as_secs() / 60;
        let seconds = self.elapsed.as_secs() % 60;
        format!(
            "G-NAF data was successfully imported ({} mode, {} files, {} rows) in {} minutes, {} seconds",
            self.mode, self.files_loaded, self.rows_copied, minutes, seconds
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_index_set() {
        assert_eq!(RAW_INDEXES.len(), 13);
        let mut names: Vec<&str> = RAW_INDEXES.iter().map(|(name, _, _)| *name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 13);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Raw.to_string(), "raw");
        assert_eq!(Mode::Flat.to_string(), "flat");
        assert_eq!(Mode::default(), Mode::Flat);
    }

    #[test]
    fn test_report_summary() {
        let report = PipelineReport {
            mode: Mode::Flat,
            files_loaded: 38,
            rows_copied: 40_000_000,
            transform: None,
            elapsed: Duration::from_secs(754),
        };
        let summary = report.summary();
        assert!(summary.contains("flat mode"));
        assert!(summary.contains("12 minutes, 34 seconds"));
    }
}
