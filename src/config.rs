use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

/// Where the ready-made foods catalog comes from.
#[derive(Debug, Clone, Deserialize)]
pub enum CatalogConfig {
    Postgres { database_url: String, table: String },
    File(PathBuf),
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub meals_file: PathBuf,
    pub catalog: CatalogConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match std::env::var("APP_PORT") {
            Ok(v) => v.parse::<u16>().context("APP_PORT")?,
            Err(_) => 8080,
        };
        let catalog = match (
            std::env::var("CATALOG_DATABASE_URL").ok(),
            std::env::var("CATALOG_FILE").ok(),
        ) {
            (Some(database_url), _) => CatalogConfig::Postgres {
                database_url,
                table: std::env::var("CATALOG_TABLE")
                    .unwrap_or_else(|_| "ready_made_foods".into()),
            },
            (None, Some(path)) => CatalogConfig::File(path.into()),
            (None, None) => CatalogConfig::Disabled,
        };
        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            meals_file: std::env::var("MEALS_FILE")
                .unwrap_or_else(|_| "data/meals.json".into())
                .into(),
            catalog,
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("bind address {}:{}", self.host, self.port))
    }
}
