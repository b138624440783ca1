//! Destination-table registry and input-file discovery
//!
//! Every input file must map to a table created by the schema scripts before
//! any row is copied. The mapping is derived from the file name and checked
//! against the registry up front, so an unrecognized file fails the run
//! before the first COPY rather than surfacing as a copy error mid-load.

use std::path::{Path, PathBuf};

use gnaf_common::{GnafError, Result};
use tracing::warn;

use crate::config::DataConfig;

/// Tables fed by `<REGION>_<ENTITY>_psv.psv` files
pub const STANDARD_TABLES: &[&str] = &[
    "address_alias",
    "address_default_geocode",
    "address_detail",
    "address_feature",
    "address_mesh_block_2011",
    "address_mesh_block_2016",
    "address_site",
    "address_site_geocode",
    "locality",
    "locality_alias",
    "locality_neighbour",
    "locality_point",
    "mb_2011",
    "mb_2016",
    "primary_secondary",
    "state",
    "street_locality",
    "street_locality_alias",
    "street_locality_point",
];

/// Tables fed by `Authority_Code_<ENTITY>_psv.psv` files
pub const AUTHORITY_TABLES: &[&str] = &[
    "address_alias_type_aut",
    "address_change_type_aut",
    "address_type_aut",
    "flat_type_aut",
    "geocode_reliability_aut",
    "geocode_type_aut",
    "geocoded_level_type_aut",
    "level_type_aut",
    "locality_alias_type_aut",
    "locality_class_aut",
    "mb_match_code_aut",
    "ps_join_type_aut",
    "street_class_aut",
    "street_locality_alias_type_aut",
    "street_suffix_aut",
    "street_type_aut",
];

const PSV_SUFFIX: &str = "_psv.psv";
const AUTHORITY_PREFIX: &str = "Authority_Code_";

/// Which naming pattern an input file follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `<REGION>_<ENTITY>_psv.psv` under `Standard/`
    Standard,
    /// `Authority_Code_<ENTITY>_psv.psv` under `Authority Code/`
    AuthorityCode,
}

/// One discovered input file with its validated destination table
#[derive(Debug, Clone)]
pub struct DataFile {
    pub path: PathBuf,
    pub kind: FileKind,
    pub table: String,
}

impl DataFile {
    /// Base name of the source file
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Derive the destination table from a file name
///
/// Standard files lose their leading region token and trailing `_psv.psv`;
/// authority files lose the fixed `Authority_Code_` prefix instead. The
/// result keeps the file's casing and is validated against the registry
/// case-insensitively.
pub fn destination_table(file_name: &str, kind: FileKind) -> Result<String> {
    let stem = file_name
        .strip_suffix(PSV_SUFFIX)
        .ok_or_else(|| GnafError::UnknownTable(file_name.to_string()))?;

    let entity = match kind {
        FileKind::Standard => stem
            .split_once('_')
            .map(|(_region, entity)| entity)
            .ok_or_else(|| GnafError::UnknownTable(file_name.to_string()))?,
        FileKind::AuthorityCode => stem
            .strip_prefix(AUTHORITY_PREFIX)
            .ok_or_else(|| GnafError::UnknownTable(file_name.to_string()))?,
    };

    let registry = match kind {
        FileKind::Standard => STANDARD_TABLES,
        FileKind::AuthorityCode => AUTHORITY_TABLES,
    };

    if !registry.contains(&entity.to_ascii_lowercase().as_str()) {
        return Err(GnafError::UnknownTable(file_name.to_string()));
    }

    Ok(entity.to_string())
}

/// Discover all input files under the two fixed directory globs
///
/// Standard files come first, then authority files; each set sorted by path
/// for a consistent load order. Every file's destination table is resolved
/// here, so the whole file set is known valid before ingestion begins.
pub fn discover(data: &DataConfig) -> Result<Vec<DataFile>> {
    let mut files = discover_kind(&data.standard_glob(), FileKind::Standard)?;
    files.extend(discover_kind(&data.authority_glob(), FileKind::AuthorityCode)?);
    Ok(files)
}

fn discover_kind(pattern: &str, kind: FileKind) -> Result<Vec<DataFile>> {
    let entries = glob::glob(pattern)
        .map_err(|e| GnafError::config(format!("Invalid glob pattern {}: {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => {
                let table = table_for_path(&path, kind)?;
                files.push(DataFile { path, kind, table });
            },
            Ok(_) => {},
            Err(e) => {
                warn!(error = %e, "Error accessing path during discovery");
            },
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(files)
}

fn table_for_path(path: &Path, kind: FileKind) -> Result<String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| GnafError::UnknownTable(path.display().to_string()))?;
    destination_table(file_name, kind)
}
