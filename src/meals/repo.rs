use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::meals::repo_types::MealEntry;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("meal storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("meal storage holds invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Local persistence for the user's meal list. Always reads and writes the
/// whole list.
pub trait MealRepository: Send + Sync {
    fn load(&self) -> Result<Vec<MealEntry>, RepoError>;
    fn save(&self, meals: &[MealEntry]) -> Result<(), RepoError>;
}

/// Stores the list as a single JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MealRepository for JsonFileRepository {
    fn load(&self) -> Result<Vec<MealEntry>, RepoError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no meal file yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    fn save(&self, meals: &[MealEntry]) -> Result<(), RepoError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(meals)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), count = meals.len(), "meals saved");
        Ok(())
    }
}

/// Keeps the last saved snapshot in memory.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    meals: Mutex<Vec<MealEntry>>,
    saves: AtomicUsize,
}

impl InMemoryRepository {
    pub fn with_meals(meals: Vec<MealEntry>) -> Self {
        Self {
            meals: Mutex::new(meals),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self) -> Vec<MealEntry> {
        self.meals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl MealRepository for InMemoryRepository {
    fn load(&self) -> Result<Vec<MealEntry>, RepoError> {
        Ok(self.snapshot())
    }

    fn save(&self, meals: &[MealEntry]) -> Result<(), RepoError> {
        *self.meals.lock().unwrap_or_else(PoisonError::into_inner) = meals.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
