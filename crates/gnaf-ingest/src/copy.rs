//! Bulk ingestion over the PostgreSQL COPY protocol
//!
//! Each input file streams into its destination table through
//! `COPY ... FROM STDIN`, bypassing per-row statement overhead. The table
//! must already exist with matching column order. There is no transactional
//! rollback: a failure mid-file leaves the table partially copied.

use std::io::Read;

use anyhow::Context;
use gnaf_common::GnafError;
use sqlx::postgres::PgPoolCopyExt;
use sqlx::PgPool;
use tracing::info;

use crate::reader::PsvFile;
use crate::tables::DataFile;

/// Bytes per chunk sent to the COPY stream
const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Streams discovered files into their destination tables
pub struct BulkIngestor<'a> {
    pool: &'a PgPool,
}

impl<'a> BulkIngestor<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Copy one file into its table, returning the row count
    ///
    /// The reader applies any file corrections and consumes the header row;
    /// everything after it goes to the server verbatim. A field-count
    /// mismatch on any line is reported by the server and surfaces here as a
    /// malformed-record error.
    pub async fn load_file(&self, file: &DataFile) -> anyhow::Result<u64> {
        let file_name = file.file_name().to_string();
        let psv = PsvFile::open(&file.path)
            .with_context(|| format!("Failed to open {}", file.path.display()))?;

        let statement = format!(
            "COPY {} FROM STDIN (FORMAT text, DELIMITER '|', NULL '')",
            file.table
        );

        let mut copy = self
            .pool
            .copy_in_raw(&statement)
            .await
            .with_context(|| format!("Failed to start COPY into {}", file.table))?;

        let mut body = psv.into_body();
        let mut buf = vec![0u8; COPY_CHUNK_SIZE];
        loop {
            let n = body
                .read(&mut buf)
                .with_context(|| format!("Failed reading {}", file_name))?;
            if n == 0 {
                break;
            }
            if let Err(e) = copy.send(&buf[..n]).await {
                return Err(copy_error(e, &file_name, &file.table));
            }
        }

        let rows = match copy.finish().await {
            Ok(rows) => rows,
            Err(e) => return Err(copy_error(e, &file_name, &file.table)),
        };

        info!(file = %file_name, table = %file.table, rows, "Imported file");

        Ok(rows)
    }
}

/// Classify a COPY failure
///
/// Errors the server reports about the stream contents (bad field counts,
/// bad escapes) are format errors against the source file; anything else is
/// an ordinary database failure.
fn copy_error(e: sqlx::Error, file_name: &str, table: &str) -> anyhow::Error {
    match e {
        sqlx::Error::Database(db) => {
            GnafError::malformed(file_name, db.message().to_string()).into()
        },
        other => anyhow::Error::new(other)
            .context(format!("COPY into {} failed for {}", table, file_name)),
    }
}
