//! Schema script execution
//!
//! The three G-NAF SQL assets are consumed verbatim, each as one opaque
//! statement batch. Foreign-key constraints must run only after every file
//! has loaded: bulk-loaded data arrives in no particular dependency order,
//! so earlier constraint checks would reject valid late-arriving rows.

use std::fs;
use std::path::Path;

use anyhow::Context;
use gnaf_common::GnafError;
use sqlx::PgPool;
use tracing::info;

use crate::config::DataConfig;

/// Resolved locations of the three schema scripts
pub struct SchemaScripts {
    tables_script: std::path::PathBuf,
    constraints_script: std::path::PathBuf,
    view_script: std::path::PathBuf,
}

impl SchemaScripts {
    /// Resolve script paths from the data configuration
    pub fn from_config(data: &DataConfig) -> Self {
        Self {
            tables_script: data.create_tables(),
            constraints_script: data.fk_constraints(),
            view_script: data.address_view(),
        }
    }

    /// Execute the table-creation script
    pub async fn create_tables(&self, pool: &PgPool) -> anyhow::Result<()> {
        run_script(pool, &self.tables_script)
            .await
            .context("Failed to create tables")
    }

    /// Execute the foreign-key-constraint script (after all loads)
    pub async fn apply_constraints(&self, pool: &PgPool) -> anyhow::Result<()> {
        run_script(pool, &self.constraints_script)
            .await
            .context("Failed to apply foreign key constraints")
    }

    /// Execute the address-view script
    pub async fn build_view(&self, pool: &PgPool) -> anyhow::Result<()> {
        run_script(pool, &self.view_script)
            .await
            .context("Failed to build address view")
    }
}

/// Read one SQL asset and execute it as a single statement batch
async fn run_script(pool: &PgPool, path: &Path) -> anyhow::Result<()> {
    let sql = fs::read_to_string(path)
        .map_err(|_| GnafError::MissingAsset(path.to_path_buf()))?;

    info!(script = %path.display(), "Executing schema script");

    sqlx::raw_sql(&sql)
        .execute(pool)
        .await
        .with_context(|| format!("Script failed: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_scripts_resolve_from_config() {
        let data = DataConfig {
            data_dir: PathBuf::from("G-NAF"),
            create_tables_script: None,
            fk_constraints_script: Some(PathBuf::from("/custom/fk.sql")),
            address_view_script: None,
        };

        let scripts = SchemaScripts::from_config(&data);
        assert_eq!(
            scripts.tables_script,
            PathBuf::from("G-NAF/Extras/GNAF_TableCreation_Scripts/create_tables_ansi.sql")
        );
        assert_eq!(scripts.constraints_script, PathBuf::from("/custom/fk.sql"));
        assert_eq!(
            scripts.view_script,
            PathBuf::from("G-NAF/Extras/GNAF_View_Scripts/address_view.sql")
        );
    }
}
