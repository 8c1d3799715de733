use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use crate::db::FoodStore;
use crate::meal_log::MealLogStore;
use crate::models::{FoodItem, MealLogEntry, NewFoodItem, NewMealLog};
use crate::usda::normalize_batch;

/// Remote nutrition database consulted when the local store has no match.
///
/// Returns the raw candidate records of one search; normalization happens here in
/// the service. Called synchronously, so async callers should invoke
/// `NutriService` methods from a blocking thread.
pub trait NutritionProvider: Send + Sync {
    fn search(&self, query: &str) -> Result<Vec<Value>>;
}

/// Food lookup and meal logging over the two stores.
///
/// Each store sits behind its own mutex, held for a single store call at a time and
/// never across a provider request.
pub struct NutriService {
    foods: Mutex<FoodStore>,
    logs: Mutex<MealLogStore>,
}

impl NutriService {
    #[must_use]
    pub fn new(foods: FoodStore, logs: MealLogStore) -> Self {
        Self {
            foods: Mutex::new(foods),
            logs: Mutex::new(logs),
        }
    }

    pub fn open(food_db: &str, meal_log_db: &str) -> Result<Self> {
        let foods = FoodStore::open(food_db).context("failed to open food store")?;
        let logs = MealLogStore::open(meal_log_db).context("failed to open meal-log store")?;
        Ok(Self::new(foods, logs))
    }

    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(
            FoodStore::open_in_memory()?,
            MealLogStore::open_in_memory()?,
        ))
    }

    fn foods(&self) -> MutexGuard<'_, FoodStore> {
        self.foods
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn logs(&self) -> MutexGuard<'_, MealLogStore> {
        self.logs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // --- Food lookup ---

    /// Search the local store, falling back to the provider on a miss.
    ///
    /// On a miss the provider's batch is normalized, deduplicated by name, written in
    /// one transaction and returned with assigned ids. Rows from earlier searches are
    /// not consulted, so overlapping searches can store the same name twice.
    pub fn search_foods(
        &self,
        provider: &dyn NutritionProvider,
        query: &str,
    ) -> Result<Vec<FoodItem>> {
        let local = self.foods().search_by_name(query).context("database error")?;
        if !local.is_empty() {
            info!(query, hits = local.len(), "food search served from local store");
            return Ok(local);
        }

        info!(query, "no local match, querying nutrition provider");
        let candidates = provider.search(query)?;
        let batch = normalize_batch(&candidates);

        let stored = self
            .foods()
            .insert_foods(&batch)
            .context("failed to store provider results")?;
        info!(
            query,
            candidates = candidates.len(),
            stored = stored.len(),
            "cached provider results"
        );
        Ok(stored)
    }

    /// Seed a food item directly, bypassing the provider.
    pub fn add_food(&self, food: &NewFoodItem) -> Result<FoodItem> {
        self.foods().insert_food(food)
    }

    // --- Meal logs ---

    /// Persist one meal-log document. `food_id` is not checked against the food store.
    pub fn log_meal(&self, log: &NewMealLog) -> Result<MealLogEntry> {
        let entry = self
            .logs()
            .insert_meal_log(log)
            .context("failed to insert meal log")?;
        info!(id = %entry.id, user_id = %entry.user_id, "logged meal");
        Ok(entry)
    }

    pub fn get_meal_log(&self, id: &str) -> Result<Option<MealLogEntry>> {
        self.logs().get_meal_log(id)
    }

    pub fn meal_logs_for_user(&self, user_id: &str) -> Result<Vec<MealLogEntry>> {
        self.logs().meal_logs_for_user(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    struct MockProvider {
        foods: Vec<Value>,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(foods: Vec<Value>) -> Self {
            Self {
                foods,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl NutritionProvider for MockProvider {
        fn search(&self, _query: &str) -> Result<Vec<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.foods.clone())
        }
    }

    struct FailingProvider;

    impl NutritionProvider for FailingProvider {
        fn search(&self, _query: &str) -> Result<Vec<Value>> {
            anyhow::bail!("provider unreachable")
        }
    }

    fn usda_food(description: &str, calories: f64) -> Value {
        json!({
            "description": description,
            "foodNutrients": [
                { "value": calories },
                { "value": 1.0 },
                { "value": 2.0 },
                { "value": 3.0 }
            ]
        })
    }

    fn seed(svc: &NutriService, name: &str) -> FoodItem {
        svc.add_food(&NewFoodItem {
            name: name.to_string(),
            calories: 100.0,
            protein: 0.0,
            carbs: 0.0,
            fat: 0.0,
        })
        .unwrap()
    }

    #[test]
    fn test_search_local_hit_skips_provider() {
        let svc = NutriService::new_in_memory().unwrap();
        let egg = seed(&svc, "Boiled Egg");
        seed(&svc, "Toast");
        let provider = MockProvider::new(vec![usda_food("Egg", 155.0)]);

        let results = svc.search_foods(&provider, "EGG").unwrap();
        assert_eq!(results, vec![egg]);
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_search_miss_calls_provider_once_and_caches() {
        let svc = NutriService::new_in_memory().unwrap();
        let provider = MockProvider::new(vec![
            usda_food("Banana, raw", 89.0),
            usda_food("banana, raw ", 95.0),
            usda_food("Banana bread", 326.0),
        ]);

        let results = svc.search_foods(&provider, "banana").unwrap();
        assert_eq!(provider.calls(), 1);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "BANANA, RAW");
        assert_eq!(results[0].calories, 95.0);
        assert_eq!(results[1].name, "BANANA BREAD");
        assert_eq!(svc.foods().get_food_by_id(results[0].id).unwrap(), results[0]);

        // Second search is served from the store
        let again = svc.search_foods(&provider, "banana").unwrap();
        assert_eq!(again, results);
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_search_non_ascii_name_is_cached() {
        let svc = NutriService::new_in_memory().unwrap();
        let provider = MockProvider::new(vec![usda_food("Crème fraîche", 292.0)]);

        let first = svc.search_foods(&provider, "crème fraîche").unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].name, "CRÈME FRAÎCHE");

        let again = svc.search_foods(&provider, "crème fraîche").unwrap();
        assert_eq!(again, first);
        assert_eq!(provider.calls(), 1);
        assert_eq!(svc.foods().count().unwrap(), 1);
    }

    #[test]
    fn test_search_miss_with_empty_batch() {
        let svc = NutriService::new_in_memory().unwrap();
        let provider = MockProvider::new(vec![]);

        assert!(svc.search_foods(&provider, "unobtainium").unwrap().is_empty());
        assert_eq!(provider.calls(), 1);

        // Still a miss, so the provider is asked again
        svc.search_foods(&provider, "unobtainium").unwrap();
        assert_eq!(provider.calls(), 2);
    }

    #[test]
    fn test_search_skips_malformed_candidates() {
        let svc = NutriService::new_in_memory().unwrap();
        let provider = MockProvider::new(vec![
            json!({ "foodNutrients": [{ "value": 50.0 }] }),
            json!({ "description": "Kale" }),
        ]);

        let results = svc.search_foods(&provider, "kale").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "KALE");
        assert_eq!(results[0].calories, 0.0);
    }

    #[test]
    fn test_search_provider_failure_propagates() {
        let svc = NutriService::new_in_memory().unwrap();

        let err = svc.search_foods(&FailingProvider, "kale").unwrap_err();
        assert!(format!("{err:#}").contains("provider unreachable"));
        assert_eq!(svc.foods().count().unwrap(), 0);
    }

    #[test]
    fn test_overlapping_searches_store_duplicate_names() {
        let svc = NutriService::new_in_memory().unwrap();
        let provider = MockProvider::new(vec![usda_food("Greek Yogurt", 59.0)]);

        svc.search_foods(&provider, "greek").unwrap();
        // "yogurt plain" does not match the cached row, so the same item is fetched again
        svc.search_foods(&provider, "yogurt plain").unwrap();

        assert_eq!(provider.calls(), 2);
        assert_eq!(svc.foods().search_by_name("greek yogurt").unwrap().len(), 2);
    }

    /// Blocks each search until `parties` searches are inside the provider.
    struct RendezvousProvider {
        barrier: Barrier,
        inner: MockProvider,
    }

    impl NutritionProvider for RendezvousProvider {
        fn search(&self, query: &str) -> Result<Vec<Value>> {
            self.barrier.wait();
            self.inner.search(query)
        }
    }

    #[test]
    fn test_concurrent_identical_searches_both_insert() {
        // Accepted behaviour: no coordination between concurrent misses.
        let svc = Arc::new(NutriService::new_in_memory().unwrap());
        let provider = Arc::new(RendezvousProvider {
            barrier: Barrier::new(2),
            inner: MockProvider::new(vec![usda_food("Lentils", 116.0)]),
        });

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let svc = Arc::clone(&svc);
                let provider = Arc::clone(&provider);
                std::thread::spawn(move || svc.search_foods(provider.as_ref(), "lentils").unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().len(), 1);
        }

        assert_eq!(provider.inner.calls(), 2);
        assert_eq!(svc.foods().search_by_name("lentils").unwrap().len(), 2);
    }

    #[test]
    fn test_log_meal() {
        let svc = NutriService::new_in_memory().unwrap();
        let entry = svc
            .log_meal(&NewMealLog {
                user_id: "u1".to_string(),
                food_id: 42,
                quantity: 1.5,
            })
            .unwrap();

        assert!(!entry.id.is_empty());
        assert_eq!(entry.user_id, "u1");
        assert_eq!(entry.food_id, 42);
        assert_eq!(entry.quantity, 1.5);

        assert_eq!(svc.get_meal_log(&entry.id).unwrap(), Some(entry.clone()));
        assert_eq!(svc.meal_logs_for_user("u1").unwrap(), vec![entry]);
    }
}
