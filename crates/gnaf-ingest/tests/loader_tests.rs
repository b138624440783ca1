//! Integration tests for the G-NAF loader
//!
//! Coverage includes:
//! - File discovery and table-name derivation over a synthetic G-NAF tree
//! - Reader-to-formatter flow on PSV content
//! - Correction rules applied during discovery-driven reads
//! - Transform-driver behavior against a live PostgreSQL (ignored by
//!   default; needs a local server with the default credentials)

use std::fs;
use std::path::PathBuf;

use gnaf_ingest::config::DataConfig;
use gnaf_ingest::format::{autocomplete, AddressParts};
use gnaf_ingest::reader::PsvFile;
use gnaf_ingest::tables::{self, FileKind};

/// Build a minimal G-NAF distribution tree under a temp directory
fn synthetic_distribution() -> (tempfile::TempDir, DataConfig) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("G-NAF MAY 2026");
    let standard = root.join("Standard");
    let authority = root.join("Authority Code");
    fs::create_dir_all(&standard).unwrap();
    fs::create_dir_all(&authority).unwrap();

    fs::write(
        standard.join("NSW_STATE_psv.psv"),
        "STATE_PID|DATE_CREATED|DATE_RETIRED|STATE_NAME|STATE_ABBREVIATION\n\
         1|2026-02-01||NEW SOUTH WALES|NSW\n",
    )
    .unwrap();
    fs::write(
        standard.join("NSW_LOCALITY_psv.psv"),
        "LOCALITY_PID|LOCALITY_NAME|STATE_PID\n\
         NSW1|SYDNEY|1\n\
         NSW2|NEWCASTLE|1\n",
    )
    .unwrap();
    fs::write(
        authority.join("Authority_Code_STREET_TYPE_AUT_psv.psv"),
        "CODE|NAME|DESCRIPTION\n\
         STREET|STREET|STREET\n\
         ROAD|ROAD|ROAD\n",
    )
    .unwrap();

    let data = DataConfig {
        data_dir: dir.path().to_path_buf(),
        create_tables_script: None,
        fk_constraints_script: None,
        address_view_script: None,
    };

    (dir, data)
}

// ============================================================================
// Discovery Tests
// ============================================================================

#[test]
fn test_discover_synthetic_distribution() {
    let (_dir, data) = synthetic_distribution();

    let files = tables::discover(&data).unwrap();
    assert_eq!(files.len(), 3);

    // Standard files come first, sorted by path
    assert_eq!(files[0].table, "LOCALITY");
    assert_eq!(files[0].kind, FileKind::Standard);
    assert_eq!(files[1].table, "STATE");
    assert_eq!(files[2].table, "STREET_TYPE_AUT");
    assert_eq!(files[2].kind, FileKind::AuthorityCode);
}

#[test]
fn test_discover_rejects_unknown_entity() {
    let (dir, data) = synthetic_distribution();
    let standard = dir.path().join("G-NAF MAY 2026").join("Standard");
    fs::write(standard.join("NSW_FUTURE_ENTITY_psv.psv"), "A|B\n").unwrap();

    assert!(tables::discover(&data).is_err());
}

// ============================================================================
// Reader Tests
// ============================================================================

#[test]
fn test_reader_streams_discovered_files() {
    let (_dir, data) = synthetic_distribution();
    let files = tables::discover(&data).unwrap();

    let locality = files.iter().find(|f| f.table == "LOCALITY").unwrap();
    let mut psv = PsvFile::open(&locality.path).unwrap();
    assert_eq!(psv.header().len(), 3);

    let records: Vec<_> = psv.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0][1].as_deref(), Some("SYDNEY"));
}

#[test]
fn test_record_fields_feed_the_formatter() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("NSW_ADDRESS_DETAIL_psv.psv");
    fs::write(
        &path,
        "ADDRESS_DETAIL_PID|FLAT_TYPE|FLAT_NUMBER|NUMBER_FIRST|STREET_NAME|STREET_TYPE|LOCALITY_NAME|STATE|POSTCODE\n\
         GANSW1|UNIT|4|12|SMITH|STREET|SYDNEY|NSW|2000\n\
         GANSW2||||MAIN||PERTH|WA|6000\n",
    )
    .unwrap();

    let mut psv = PsvFile::open(&path).unwrap();
    let records: Vec<_> = psv.records().map(|r| r.unwrap()).collect();

    let to_parts = |fields: &[Option<String>]| AddressParts {
        flat_type: fields[1].clone(),
        flat_number: fields[2].clone(),
        number_first: fields[3].clone(),
        street_name: fields[4].clone(),
        street_type: fields[5].clone(),
        locality_name: fields[6].clone(),
        state_abbreviation: fields[7].clone(),
        postcode: fields[8].clone(),
        ..Default::default()
    };

    assert_eq!(
        autocomplete(&to_parts(&records[0])),
        "UNIT 4, 12 SMITH STREET, SYDNEY NSW 2000"
    );
    assert_eq!(autocomplete(&to_parts(&records[1])), "MAIN , PERTH WA 6000");
}

// ============================================================================
// Live Database Tests
// ============================================================================

#[tokio::test]
#[ignore = "requires a local PostgreSQL server with the default credentials"]
async fn test_transform_driver_against_live_database() {
    use gnaf_ingest::transform::TransformDriver;
    use gnaf_ingest::{db, Config};

    let mut config = Config::default();
    config.database.database = "gnaf_ingest_test".to_string();

    let admin = db::connect_admin(&config.database).await.unwrap();
    sqlx::raw_sql("DROP DATABASE IF EXISTS gnaf_ingest_test")
        .execute(&admin)
        .await
        .unwrap();
    db::create_database(&admin, "gnaf_ingest_test").await.unwrap();
    admin.close().await;

    let pool = db::connect(&config.database).await.unwrap();
    sqlx::raw_sql(
        "CREATE TABLE national_address_list (\
             address_detail_pid text PRIMARY KEY, \
             building_name text, flat_type text, flat_number_prefix text, \
             flat_number text, flat_number_suffix text, number_first text, \
             number_first_suffix text, number_last text, number_last_suffix text, \
             street_name text, street_type text, locality_name text, \
             state_abbreviation text, postcode text, autocomplete text)",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO national_address_list \
             (address_detail_pid, flat_type, flat_number, number_first, street_name, \
              street_type, locality_name, state_abbreviation, postcode) \
         VALUES \
             ('GANSW1', 'UNIT', '4', '12', 'SMITH', 'STREET', 'SYDNEY', 'NSW', '2000'), \
             ('GAWA1', NULL, NULL, NULL, 'MAIN', NULL, 'PERTH', 'WA', '6000')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let driver = TransformDriver::new(&pool, 1_000);
    let stats = driver.run().await.unwrap();
    assert_eq!(stats.total_rows, 2);

    let first: (String,) = sqlx::query_as(
        "SELECT autocomplete FROM national_address_list WHERE address_detail_pid = 'GANSW1'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(first.0, "UNIT 4, 12 SMITH STREET, SYDNEY NSW 2000");

    let second: (String,) = sqlx::query_as(
        "SELECT autocomplete FROM national_address_list WHERE address_detail_pid = 'GAWA1'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(second.0, "MAIN , PERTH WA 6000");

    // Re-running the driver is idempotent
    let stats = driver.run().await.unwrap();
    assert_eq!(stats.total_rows, 2);
    let again: (String,) = sqlx::query_as(
        "SELECT autocomplete FROM national_address_list WHERE address_detail_pid = 'GANSW1'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(again.0, first.0);

    pool.close().await;
}
