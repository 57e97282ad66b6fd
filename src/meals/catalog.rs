use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::debug;

use crate::meals::repo_types::ReadyMadeFood;

/// Remote source of the ready-made foods catalog. Read-only.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_all(&self) -> anyhow::Result<Vec<ReadyMadeFood>>;
}

pub(crate) fn is_valid_table_name(name: &str) -> bool {
    lazy_static! {
        static ref TABLE_RE: Regex =
            Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").unwrap();
    }
    TABLE_RE.is_match(name)
}

/// Catalog backed by a Postgres table, one row per food.
#[derive(Clone)]
pub struct PgCatalog {
    db: PgPool,
    table: String,
}

impl PgCatalog {
    /// Builds the pool without connecting; the first fetch opens the connection.
    pub fn connect_lazy(database_url: &str, table: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(is_valid_table_name(table), "invalid catalog table name {table:?}");
        let db = PgPoolOptions::new()
            .max_connections(2)
            .connect_lazy(database_url)
            .context("catalog database url")?;
        Ok(Self {
            db,
            table: table.to_string(),
        })
    }
}

#[async_trait]
impl CatalogSource for PgCatalog {
    async fn fetch_all(&self) -> anyhow::Result<Vec<ReadyMadeFood>> {
        let sql = format!(
            r#"
            SELECT name,
                   calories::float8     AS calories,
                   protein::float8      AS protein,
                   carbohydrate::float8 AS carbohydrate,
                   fat::float8          AS fat
            FROM {}
            "#,
            self.table
        );
        let rows = sqlx::query_as::<_, ReadyMadeFood>(&sql)
            .fetch_all(&self.db)
            .await
            .with_context(|| format!("select ready-made foods from {}", self.table))?;
        debug!(table = %self.table, count = rows.len(), "catalog rows fetched");
        Ok(rows)
    }
}

/// Fixed catalog, for local development without the remote backend.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    foods: Vec<ReadyMadeFood>,
}

impl StaticCatalog {
    pub fn new(foods: Vec<ReadyMadeFood>) -> Self {
        Self { foods }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch_all(&self) -> anyhow::Result<Vec<ReadyMadeFood>> {
        Ok(self.foods.clone())
    }
}

/// Catalog kept in a JSON file. The file is read on every fetch, so a missing
/// or malformed file surfaces as a fetch error rather than at construction.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for FileCatalog {
    async fn fetch_all(&self) -> anyhow::Result<Vec<ReadyMadeFood>> {
        let raw = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("read catalog file {}", self.path.display()))?;
        let foods: Vec<ReadyMadeFood> = serde_json::from_slice(&raw)
            .with_context(|| format!("parse catalog file {}", self.path.display()))?;
        debug!(path = %self.path.display(), count = foods.len(), "catalog file read");
        Ok(foods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_plain_identifiers() {
        assert!(is_valid_table_name("ready_made_foods"));
        assert!(is_valid_table_name("public.ready_made_foods"));
        assert!(!is_valid_table_name("foods; DROP TABLE meals"));
        assert!(!is_valid_table_name("1foods"));
        assert!(!is_valid_table_name(""));
    }

    #[tokio::test]
    async fn pg_catalog_rejects_bad_table_before_connecting() {
        let err = PgCatalog::connect_lazy("postgres://localhost/db", "foods--")
            .err()
            .expect("bad table name");
        assert!(err.to_string().contains("invalid catalog table name"));
    }

    #[tokio::test]
    async fn file_catalog_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foods.json");
        std::fs::write(
            &path,
            r#"[{"name":"Menemen","calories":210,"protein":11,"carbohydrate":8,"fat":15}]"#,
        )
        .unwrap();

        let foods = FileCatalog::new(&path).fetch_all().await.unwrap();
        assert_eq!(foods.len(), 1);
        assert_eq!(foods[0].name, "Menemen");
        assert_eq!(foods[0].calories, 210.0);
    }

    #[tokio::test]
    async fn file_catalog_errors_surface_on_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let missing = FileCatalog::new(dir.path().join("missing.json"));
        let err = missing.fetch_all().await.unwrap_err();
        assert!(err.to_string().contains("read catalog file"));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[{").unwrap();
        let err = FileCatalog::new(path).fetch_all().await.unwrap_err();
        assert!(err.to_string().contains("parse catalog file"));
    }
}
