use crate::clock::SystemClock;
use crate::config::{AppConfig, CatalogConfig};
use crate::meals::catalog::{CatalogSource, FileCatalog, PgCatalog, StaticCatalog};
use crate::meals::repo::JsonFileRepository;
use crate::meals::summary::NutritionSummarizer;
use crate::meals::MealStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub store: MealStore,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let (state, _catalog_load) = Self::from_config(AppConfig::from_env()?)?;
        Ok(state)
    }

    /// Wires the store for `config` and starts the catalog fetch. The fetch
    /// runs detached; a failing source only leaves the catalog empty.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_config(config: AppConfig) -> anyhow::Result<(Self, JoinHandle<()>)> {
        let config = Arc::new(config);

        let store = MealStore::new(
            Arc::new(JsonFileRepository::new(&config.meals_file)),
            Arc::new(SystemClock),
            Arc::new(NutritionSummarizer),
        );

        let catalog: Arc<dyn CatalogSource> = match &config.catalog {
            CatalogConfig::Postgres {
                database_url,
                table,
            } => Arc::new(PgCatalog::connect_lazy(database_url, table)?),
            CatalogConfig::File(path) => Arc::new(FileCatalog::new(path)),
            CatalogConfig::Disabled => {
                warn!("no catalog source configured; food search will be empty");
                Arc::new(StaticCatalog::default())
            }
        };
        let catalog_load = store.spawn_catalog_load(catalog);

        Ok((Self { store, config }, catalog_load))
    }

    pub fn from_parts(store: MealStore, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    #[cfg(test)]
    pub async fn fake() -> Self {
        use crate::clock::FixedClock;
        use crate::meals::repo::InMemoryRepository;
        use crate::meals::repo_types::ReadyMadeFood;
        use time::macros::date;

        let food = |name: &str| ReadyMadeFood {
            name: name.into(),
            calories: 100.0,
            protein: 5.0,
            carbohydrate: 10.0,
            fat: 3.0,
        };

        let store = MealStore::new(
            Arc::new(InMemoryRepository::default()),
            Arc::new(FixedClock(date!(2024 - 06 - 10))),
            Arc::new(NutritionSummarizer),
        );
        store
            .load_catalog(&StaticCatalog::new(vec![
                food("Boiled egg"),
                food("Rice"),
                food("Egg salad"),
            ]))
            .await;

        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            meals_file: "unused.json".into(),
            catalog: CatalogConfig::Disabled,
        });

        Self::from_parts(store, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_catalog_file_does_not_block_startup() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_file = dir.path().join("missing.json");
        let config = AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            meals_file: dir.path().join("meals.json"),
            catalog: CatalogConfig::File(catalog_file.clone()),
        };

        let (state, catalog_load) = AppState::from_config(config).expect("startup succeeds");
        catalog_load.await.unwrap();
        assert!(state.store.catalog().is_empty());
        assert!(state.store.search("").is_empty());

        // the env-driven path behaves the same
        std::env::set_var("CATALOG_FILE", &catalog_file);
        std::env::set_var("MEALS_FILE", dir.path().join("env-meals.json"));
        std::env::remove_var("CATALOG_DATABASE_URL");
        let state = AppState::init().await.expect("init succeeds");
        assert!(state.store.catalog().is_empty());
        assert!(state.store.meals().is_empty());
    }
}
