//! Batched autocomplete transform
//!
//! Flat mode only. The full address population is partitioned by state or
//! territory to bound the working set: each partition streams off a
//! server-side cursor in fixed-size fetches, runs through the formatter, and
//! is written back with one bulk set-from-values update before its
//! transaction commits. Partitions are processed strictly sequentially and
//! committed independently; re-running a partition overwrites the same keys
//! with identical values, so a failed run can simply be repeated.

use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use crate::format::{autocomplete, AddressParts};

/// The flat search table materialized in flat mode
pub const FLAT_TABLE: &str = "national_address_list";

/// State and territory partition keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Act,
    Nsw,
    Nt,
    Ot,
    Qld,
    Sa,
    Tas,
    Vic,
    Wa,
}

/// Every region, in processing order
pub const REGIONS: [Region; 9] = [
    Region::Act,
    Region::Nsw,
    Region::Nt,
    Region::Ot,
    Region::Qld,
    Region::Sa,
    Region::Tas,
    Region::Vic,
    Region::Wa,
];

impl Region {
    /// The state abbreviation stored on every flat row
    pub fn code(&self) -> &'static str {
        match self {
            Region::Act => "ACT",
            Region::Nsw => "NSW",
            Region::Nt => "NT",
            Region::Ot => "OT",
            Region::Qld => "QLD",
            Region::Sa => "SA",
            Region::Tas => "TAS",
            Region::Vic => "VIC",
            Region::Wa => "WA",
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// One flat row's formatter inputs, keyed by the stable record identifier
#[derive(Debug, sqlx::FromRow)]
struct FlatRow {
    address_detail_pid: String,
    building_name: Option<String>,
    flat_type: Option<String>,
    flat_number_prefix: Option<String>,
    flat_number: Option<String>,
    flat_number_suffix: Option<String>,
    number_first: Option<String>,
    number_first_suffix: Option<String>,
    number_last: Option<String>,
    number_last_suffix: Option<String>,
    street_name: Option<String>,
    street_type: Option<String>,
    locality_name: Option<String>,
    state_abbreviation: Option<String>,
    postcode: Option<String>,
}

impl FlatRow {
    fn into_keyed_parts(self) -> (String, AddressParts) {
        (
            self.address_detail_pid,
            AddressParts {
                building_name: self.building_name,
                flat_type: self.flat_type,
                flat_number_prefix: self.flat_number_prefix,
                flat_number: self.flat_number,
                flat_number_suffix: self.flat_number_suffix,
                number_first: self.number_first,
                number_first_suffix: self.number_first_suffix,
                number_last: self.number_last,
                number_last_suffix: self.number_last_suffix,
                street_name: self.street_name,
                street_type: self.street_type,
                locality_name: self.locality_name,
                state_abbreviation: self.state_abbreviation,
                postcode: self.postcode,
            },
        )
    }
}

/// Drives the per-partition read-format-write cycle
pub struct TransformDriver<'a> {
    pool: &'a PgPool,
    fetch_batch_size: usize,
}

impl<'a> TransformDriver<'a> {
    pub fn new(pool: &'a PgPool, fetch_batch_size: usize) -> Self {
        Self {
            pool,
            fetch_batch_size,
        }
    }

    /// Format every row of every partition
    pub async fn run(&self) -> anyhow::Result<TransformStats> {
        let mut stats = TransformStats::default();

        for region in REGIONS {
            let rows = self
                .process_partition(region)
                .await
                .with_context(|| format!("Failed to transform partition {}", region))?;
            info!(region = %region, rows, "Partition formatted");
            stats.record(region, rows);
        }

        Ok(stats)
    }

    /// Stream one partition through the formatter and write it back
    async fn process_partition(&self, region: Region) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;

        // Region codes are a fixed enumeration, so the cursor statement is
        // assembled textually; DECLARE takes no bind parameters.
        let declare = format!(
            "DECLARE addr_cursor NO SCROLL CURSOR FOR \
             SELECT address_detail_pid, building_name, flat_type, flat_number_prefix, \
                    flat_number, flat_number_suffix, number_first, number_first_suffix, \
                    number_last, number_last_suffix, street_name, street_type, \
                    locality_name, state_abbreviation, postcode \
             FROM {} WHERE state_abbreviation = '{}'",
            FLAT_TABLE,
            region.code()
        );
        sqlx::query(&declare).execute(&mut *tx).await?;

        let fetch = format!("FETCH FORWARD {} FROM addr_cursor", self.fetch_batch_size);
        let mut pids: Vec<String> = Vec::new();
        let mut strings: Vec<String> = Vec::new();

        loop {
            let batch: Vec<FlatRow> = sqlx::query_as(&fetch).fetch_all(&mut *tx).await?;
            if batch.is_empty() {
                break;
            }

            debug!(region = %region, batch = batch.len(), "Fetched batch");

            for row in batch {
                let (pid, parts) = row.into_keyed_parts();
                strings.push(autocomplete(&parts));
                pids.push(pid);
            }
        }

        sqlx::query("CLOSE addr_cursor").execute(&mut *tx).await?;

        let rows = pids.len() as u64;
        if rows > 0 {
            self.write_back(&mut tx, &pids, &strings).await?;
        }

        tx.commit().await?;

        Ok(rows)
    }

    /// One bulk set-from-values update for the whole partition
    async fn write_back(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        pids: &[String],
        strings: &[String],
    ) -> anyhow::Result<()> {
        let update = format!(
            "UPDATE {} AS nal \
             SET autocomplete = updates.autocomplete \
             FROM (SELECT unnest($1::text[]) AS address_detail_pid, \
                          unnest($2::text[]) AS autocomplete) AS updates \
             WHERE nal.address_detail_pid = updates.address_detail_pid",
            FLAT_TABLE
        );

        sqlx::query(&update)
            .bind(pids)
            .bind(strings)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}

/// Rows formatted per partition
#[derive(Debug, Clone, Default)]
pub struct TransformStats {
    pub total_rows: u64,
    pub by_region: Vec<(Region, u64)>,
}

impl TransformStats {
    fn record(&mut self, region: Region, rows: u64) {
        self.total_rows += rows;
        self.by_region.push((region, rows));
    }

    /// One-line summary for the run report
    pub fn summary(&self) -> String {
        format!(
            "Formatted {} rows across {} partitions",
            self.total_rows,
            self.by_region.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regions_are_exhaustive_and_distinct() {
        assert_eq!(REGIONS.len(), 9);
        let codes: Vec<&str> = REGIONS.iter().map(|r| r.code()).collect();
        let mut deduped = codes.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), codes.len());
    }

    #[test]
    fn test_flat_row_maps_onto_parts() {
        let row = FlatRow {
            address_detail_pid: "GANSW123".to_string(),
            building_name: None,
            flat_type: Some("UNIT".to_string()),
            flat_number_prefix: None,
            flat_number: Some("4".to_string()),
            flat_number_suffix: None,
            number_first: Some("12".to_string()),
            number_first_suffix: None,
            number_last: None,
            number_last_suffix: None,
            street_name: Some("SMITH".to_string()),
            street_type: Some("STREET".to_string()),
            locality_name: Some("SYDNEY".to_string()),
            state_abbreviation: Some("NSW".to_string()),
            postcode: Some("2000".to_string()),
        };

        let (pid, parts) = row.into_keyed_parts();
        assert_eq!(pid, "GANSW123");
        assert_eq!(
            autocomplete(&parts),
            "UNIT 4, 12 SMITH STREET, SYDNEY NSW 2000"
        );
    }

    #[test]
    fn test_stats_summary() {
        let mut stats = TransformStats::default();
        stats.record(Region::Nsw, 100);
        stats.record(Region::Vic, 50);
        assert_eq!(stats.total_rows, 150);
        assert_eq!(stats.summary(), "Formatted 150 rows across 2 partitions");
    }
}
