use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use time::Date;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::catalog::CatalogSource;
use super::repo::MealRepository;
use super::repo_types::{MacroTotals, MealEntry, MealPatch, MealSlot, NewMealEntry, ReadyMadeFood};
use super::services;
use super::summary::{DailySummarizer, DailySummary};
use crate::clock::Clock;

/// Shared handle to the user's meal log and the ready-made foods catalog.
///
/// Cloning is cheap; every clone sees the same state. Mutations are written
/// through to the [`MealRepository`] as a full snapshot before the write lock
/// is released, so the persisted list never lags behind memory.
#[derive(Clone)]
pub struct MealStore {
    inner: Arc<Inner>,
}

struct Inner {
    meals: RwLock<Vec<MealEntry>>,
    catalog: RwLock<Vec<ReadyMadeFood>>,
    repo: Arc<dyn MealRepository>,
    clock: Arc<dyn Clock>,
    summarizer: Arc<dyn DailySummarizer>,
    revision: watch::Sender<u64>,
    closed: AtomicBool,
}

impl MealStore {
    /// Seeds the meal list from `repo`. An unreadable store starts empty.
    pub fn new(
        repo: Arc<dyn MealRepository>,
        clock: Arc<dyn Clock>,
        summarizer: Arc<dyn DailySummarizer>,
    ) -> Self {
        let meals = match repo.load() {
            Ok(meals) => dedupe_ids(meals),
            Err(e) => {
                warn!(error = %e, "could not load saved meals; starting empty");
                Vec::new()
            }
        };
        info!(count = meals.len(), "meal store loaded");
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                meals: RwLock::new(meals),
                catalog: RwLock::new(Vec::new()),
                repo,
                clock,
                summarizer,
                revision,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Fetches the catalog in the background. The task only keeps a weak
    /// reference, so a store dropped (or closed) mid-fetch discards the result.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_catalog_load(&self, source: Arc<dyn CatalogSource>) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let result = source.fetch_all().await;
            match weak.upgrade() {
                Some(inner) => MealStore { inner }.apply_catalog(result),
                None => debug!("meal store dropped before catalog arrived"),
            }
        })
    }

    pub async fn load_catalog(&self, source: &dyn CatalogSource) {
        let result = source.fetch_all().await;
        self.apply_catalog(result);
    }

    fn apply_catalog(&self, result: anyhow::Result<Vec<ReadyMadeFood>>) {
        let foods = match result {
            Ok(foods) => foods,
            Err(e) => {
                error!(error = %e, "failed to load ready-made foods");
                return;
            }
        };
        // closed is checked under the catalog lock that close() also takes
        let mut catalog = write(&self.inner.catalog);
        if self.is_closed() {
            debug!("meal store closed; ignoring catalog result");
            return;
        }
        info!(count = foods.len(), "ready-made foods loaded");
        *catalog = foods;
        drop(catalog);
        self.bump();
    }

    /// Marks the store disposed. Catalog fetches still in flight are ignored.
    pub fn close(&self) {
        let _catalog = write(&self.inner.catalog);
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Revision counter, bumped on every change to the meals or the catalog.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.inner.revision.borrow()
    }

    pub fn today_date(&self) -> Date {
        self.inner.clock.today()
    }

    pub fn meals(&self) -> Vec<MealEntry> {
        read(&self.inner.meals).clone()
    }

    pub fn catalog(&self) -> Vec<ReadyMadeFood> {
        read(&self.inner.catalog).clone()
    }

    pub fn search(&self, text: &str) -> Vec<ReadyMadeFood> {
        services::search_catalog(&read(&self.inner.catalog), text)
    }

    pub fn add(&self, entry: NewMealEntry) -> MealEntry {
        let today = self.today_date();
        let mut meals = write(&self.inner.meals);
        let mut id = Uuid::new_v4();
        while meals.iter().any(|m| m.id == id) {
            id = Uuid::new_v4();
        }
        let meal = entry.into_entry(id, today);
        meals.push(meal.clone());
        debug!(id = %meal.id, name = %meal.name, "meal added");
        self.commit(&meals);
        meal
    }

    /// Returns the updated entry, or `None` (and changes nothing) for an unknown id.
    pub fn update(&self, id: Uuid, patch: MealPatch) -> Option<MealEntry> {
        let mut meals = write(&self.inner.meals);
        let meal = meals.iter_mut().find(|m| m.id == id)?;
        patch.apply(meal);
        let updated = meal.clone();
        debug!(%id, "meal updated");
        self.commit(&meals);
        Some(updated)
    }

    /// Returns whether an entry was removed.
    pub fn remove(&self, id: Uuid) -> bool {
        let mut meals = write(&self.inner.meals);
        let before = meals.len();
        meals.retain(|m| m.id != id);
        if meals.len() == before {
            return false;
        }
        debug!(%id, "meal removed");
        self.commit(&meals);
        true
    }

    pub fn today(&self) -> Vec<MealEntry> {
        services::meals_on(&read(&self.inner.meals), self.today_date())
    }

    pub fn today_total_calories(&self) -> f64 {
        services::total_calories(&self.today())
    }

    pub fn today_totals(&self) -> MacroTotals {
        services::macro_totals(&self.today())
    }

    pub fn by_slot(&self) -> BTreeMap<MealSlot, Vec<MealEntry>> {
        services::group_by_slot(&self.today())
    }

    pub fn daily_summary(&self, date: Option<Date>) -> DailySummary {
        let date = date.unwrap_or_else(|| self.today_date());
        self.inner
            .summarizer
            .summarize(date, &read(&self.inner.meals))
    }

    pub fn most_frequent(&self) -> Vec<MealEntry> {
        services::most_frequent(&read(&self.inner.meals), services::MOST_FREQUENT_LIMIT)
    }

    // Called with the meals write lock held so saves land in mutation order.
    fn commit(&self, meals: &[MealEntry]) {
        if let Err(e) = self.inner.repo.save(meals) {
            error!(error = %e, "failed to persist meals");
        }
        self.bump();
    }

    fn bump(&self) {
        self.inner.revision.send_modify(|rev| *rev += 1);
    }
}

fn dedupe_ids(meals: Vec<MealEntry>) -> Vec<MealEntry> {
    let mut seen = HashSet::with_capacity(meals.len());
    let total = meals.len();
    let kept: Vec<_> = meals.into_iter().filter(|m| seen.insert(m.id)).collect();
    if kept.len() != total {
        warn!(dropped = total - kept.len(), "duplicate meal ids in saved data");
    }
    kept
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::meals::catalog::StaticCatalog;
    use crate::meals::repo::{InMemoryRepository, JsonFileRepository};
    use crate::meals::summary::NutritionSummarizer;
    use async_trait::async_trait;
    use time::macros::date;
    use tokio::sync::Notify;

    const TODAY: Date = date!(2024 - 06 - 10);

    fn store_with(repo: Arc<dyn MealRepository>) -> MealStore {
        MealStore::new(repo, Arc::new(FixedClock(TODAY)), Arc::new(NutritionSummarizer))
    }

    fn new_meal(name: &str, slot: MealSlot, calories: f64, date: Option<Date>) -> NewMealEntry {
        NewMealEntry {
            date,
            name: name.into(),
            calories,
            protein: 6.0,
            carbohydrate: 1.0,
            fat: 5.0,
            meal_slot: slot,
        }
    }

    fn food(name: &str) -> ReadyMadeFood {
        ReadyMadeFood {
            name: name.into(),
            calories: 100.0,
            protein: 1.0,
            carbohydrate: 1.0,
            fat: 1.0,
        }
    }

    struct FailingCatalog;

    #[async_trait]
    impl CatalogSource for FailingCatalog {
        async fn fetch_all(&self) -> anyhow::Result<Vec<ReadyMadeFood>> {
            anyhow::bail!("connection refused")
        }
    }

    /// Holds the fetch open until released.
    struct GatedCatalog {
        gate: Arc<Notify>,
        foods: Vec<ReadyMadeFood>,
    }

    #[async_trait]
    impl CatalogSource for GatedCatalog {
        async fn fetch_all(&self) -> anyhow::Result<Vec<ReadyMadeFood>> {
            self.gate.notified().await;
            Ok(self.foods.clone())
        }
    }

    #[test]
    fn egg_scenario_end_to_end() {
        let store = store_with(Arc::new(InMemoryRepository::default()));
        let egg = store.add(new_meal("Egg", MealSlot::Breakfast, 70.0, Some(TODAY)));

        assert_eq!(store.today_total_calories(), 70.0);
        let slots = store.by_slot();
        assert_eq!(slots[&MealSlot::Breakfast].len(), 1);
        assert!(slots[&MealSlot::Lunch].is_empty());
        assert!(slots[&MealSlot::Dinner].is_empty());
        assert!(slots[&MealSlot::Snack].is_empty());

        assert!(store.remove(egg.id));
        assert_eq!(store.today_total_calories(), 0.0);
    }

    #[test]
    fn added_entry_shows_up_today_with_fresh_id() {
        let store = store_with(Arc::new(InMemoryRepository::default()));
        let a = store.add(new_meal("Egg", MealSlot::Breakfast, 70.0, None));
        let b = store.add(new_meal("Egg", MealSlot::Breakfast, 70.0, None));

        assert_ne!(a.id, b.id);
        assert!(!a.id.is_nil());
        assert_eq!(a.date, TODAY);
        let today = store.today();
        assert_eq!(today.len(), 2);
        assert_eq!(today[0], a);
    }

    #[test]
    fn unknown_ids_leave_the_list_alone() {
        let repo = Arc::new(InMemoryRepository::default());
        let store = store_with(repo.clone());
        store.add(new_meal("Rice", MealSlot::Lunch, 200.0, None));
        let before = store.meals();
        let saves = repo.save_count();

        let patch = MealPatch {
            calories: Some(1.0),
            ..Default::default()
        };
        assert!(store.update(Uuid::new_v4(), patch).is_none());
        assert!(!store.remove(Uuid::new_v4()));

        assert_eq!(store.meals(), before);
        assert_eq!(repo.save_count(), saves);
    }

    #[test]
    fn update_merges_fields_and_persists() {
        let repo = Arc::new(InMemoryRepository::default());
        let store = store_with(repo.clone());
        let meal = store.add(new_meal("Rice", MealSlot::Lunch, 200.0, None));

        let updated = store
            .update(
                meal.id,
                MealPatch {
                    name: Some("Brown rice".into()),
                    meal_slot: Some(MealSlot::Dinner),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.id, meal.id);
        assert_eq!(updated.name, "Brown rice");
        assert_eq!(updated.calories, 200.0);
        assert_eq!(repo.snapshot(), vec![updated]);
    }

    #[test]
    fn every_mutation_writes_the_full_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meals.json");
        let repo = Arc::new(JsonFileRepository::new(&path));
        let store = store_with(repo.clone());

        let a = store.add(new_meal("Soup", MealSlot::Lunch, 150.0, None));
        store.add(new_meal("Bread", MealSlot::Lunch, 80.0, None));
        assert_eq!(repo.load().unwrap(), store.meals());

        store.remove(a.id);
        assert_eq!(repo.load().unwrap(), store.meals());
        assert_eq!(repo.load().unwrap().len(), 1);

        // a fresh store over the same file sees the same list
        let reopened = store_with(repo);
        assert_eq!(reopened.meals(), store.meals());
    }

    #[test]
    fn unreadable_storage_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meals.json");
        std::fs::write(&path, "garbage").unwrap();
        let store = store_with(Arc::new(JsonFileRepository::new(path)));
        assert!(store.meals().is_empty());
    }

    #[test]
    fn duplicate_ids_in_saved_data_are_dropped() {
        let store = store_with(Arc::new(InMemoryRepository::default()));
        let meal = store.add(new_meal("Tea", MealSlot::Snack, 2.0, None));
        let mut twin = meal.clone();
        twin.name = "Coffee".into();

        let reloaded = store_with(Arc::new(InMemoryRepository::with_meals(vec![
            meal.clone(),
            twin,
        ])));
        assert_eq!(reloaded.meals(), vec![meal]);
    }

    #[test]
    fn totals_exclude_other_days() {
        let store = store_with(Arc::new(InMemoryRepository::default()));
        store.add(new_meal("Egg", MealSlot::Breakfast, 70.0, None));
        store.add(new_meal("Pizza", MealSlot::Dinner, 800.0, Some(date!(2024 - 06 - 09))));
        store.add(new_meal("Yogurt", MealSlot::Snack, 100.0, None));

        assert_eq!(store.today().len(), 2);
        assert_eq!(store.today_total_calories(), 170.0);
        assert_eq!(
            store.today_totals(),
            MacroTotals {
                protein: 12.0,
                carbohydrate: 2.0,
                fat: 10.0
            }
        );
    }

    #[test]
    fn daily_summary_defaults_to_today() {
        let store = store_with(Arc::new(InMemoryRepository::default()));
        store.add(new_meal("Egg", MealSlot::Breakfast, 70.0, None));
        store.add(new_meal("Pizza", MealSlot::Dinner, 800.0, Some(date!(2024 - 06 - 09))));

        let today = store.daily_summary(None);
        assert_eq!(today.date, TODAY);
        assert_eq!(today.calories, 70.0);

        let yesterday = store.daily_summary(Some(date!(2024 - 06 - 09)));
        assert_eq!(yesterday.calories, 800.0);
        assert_eq!(yesterday.meal_count, 1);
    }

    #[test]
    fn most_frequent_over_whole_log() {
        let store = store_with(Arc::new(InMemoryRepository::default()));
        for name in ["A", "B", "A", "C", "A", "B"] {
            store.add(new_meal(name, MealSlot::Lunch, 10.0, Some(date!(2024 - 01 - 01))));
        }
        let names: Vec<_> = store.most_frequent().into_iter().map(|m| m.name).collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[tokio::test]
    async fn catalog_load_enables_search() {
        let store = store_with(Arc::new(InMemoryRepository::default()));
        assert!(store.search("").is_empty());

        let source = StaticCatalog::new(vec![food("Egg Salad"), food("Rice"), food("Fried egg")]);
        store.load_catalog(&source).await;

        assert_eq!(store.search(""), store.catalog());
        assert_eq!(store.search("EGG"), store.search("egg"));
        assert_eq!(store.search("egg").len(), 2);
    }

    #[tokio::test]
    async fn failed_catalog_fetch_is_not_fatal() {
        let store = store_with(Arc::new(InMemoryRepository::default()));
        store.spawn_catalog_load(Arc::new(FailingCatalog)).await.unwrap();

        assert!(store.catalog().is_empty());
        store.add(new_meal("Egg", MealSlot::Breakfast, 70.0, None));
        assert_eq!(store.today_total_calories(), 70.0);
    }

    #[tokio::test]
    async fn catalog_arriving_after_close_is_ignored() {
        let store = store_with(Arc::new(InMemoryRepository::default()));
        let gate = Arc::new(Notify::new());
        let handle = store.spawn_catalog_load(Arc::new(GatedCatalog {
            gate: gate.clone(),
            foods: vec![food("Rice")],
        }));

        store.close();
        gate.notify_one();
        handle.await.unwrap();

        assert!(store.catalog().is_empty());
    }

    #[tokio::test]
    async fn load_catalog_on_closed_store_changes_nothing() {
        let store = store_with(Arc::new(InMemoryRepository::default()));
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.close();
        store.load_catalog(&StaticCatalog::new(vec![food("Rice")])).await;

        assert!(store.is_closed());
        assert!(store.catalog().is_empty());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn catalog_arriving_after_drop_is_harmless() {
        let store = store_with(Arc::new(InMemoryRepository::default()));
        let gate = Arc::new(Notify::new());
        let handle = store.spawn_catalog_load(Arc::new(GatedCatalog {
            gate: gate.clone(),
            foods: vec![food("Rice")],
        }));

        drop(store);
        gate.notify_one();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn subscribers_see_each_change() {
        let store = store_with(Arc::new(InMemoryRepository::default()));
        let mut rx = store.subscribe();
        assert_eq!(*rx.borrow_and_update(), 0);

        let meal = store.add(new_meal("Egg", MealSlot::Breakfast, 70.0, None));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);

        store.remove(Uuid::new_v4());
        assert!(!rx.has_changed().unwrap());

        store.remove(meal.id);
        store.load_catalog(&StaticCatalog::new(vec![food("Rice")])).await;
        assert_eq!(*rx.borrow_and_update(), 3);
        assert_eq!(store.revision(), 3);
    }
}
