/*
 * Derives the purchase history and the frequency counters from the active
 * list. A commit takes every checked item, normalizes it into a
 * `HistoryRecord` stamped with the current time, and appends the batch to
 * the stored history while incrementing the counters by each record's
 * quantity. The prospective history is size-checked before anything is
 * written, and the store applies history and counters together or not at
 * all.
 *
 * The two list transitions built on top of a commit, validate-and-clear and
 * validate-and-keep, also live here so that the active list is only
 * rewritten after the commit succeeded.
 */
use super::clock::ClockOperations;
use super::models::{HistoryRecord, Item};
use super::size_guard;
use super::store::{GroceryStoreOperations, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitResult {
    /* Number of history records appended. Zero means nothing was checked. */
    pub committed: usize,
    pub history_len: usize,
}

impl CommitResult {
    pub fn is_empty(&self) -> bool {
        self.committed == 0
    }
}

/* What happened to the active list after a transition. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTransition {
    NothingToDo,
    Committed(CommitResult),
}

pub trait AggregationOperations: Send + Sync {
    /*
     * Appends one `HistoryRecord` per checked item to the stored history and
     * adds each record's quantity to the frequency counters. All records of
     * one commit share the same timestamp. Unchecked items are ignored and
     * the active list itself is never modified.
     *
     * Args:
     *   active_items: The current list. Only items with `checked` set are
     *                 committed.
     *
     * Returns:
     *   A `Result` containing a `CommitResult` with the number of records
     *   appended (zero when nothing was checked, in which case nothing is
     *   written). Returns `StoreError::StorageFull` when the grown history
     *   would exceed the ceiling, and leaves history and counters untouched
     *   on any error.
     */
    fn commit_purchased(&self, active_items: &[Item]) -> Result<CommitResult>;

    /* Commits checked items, then removes them from the list. */
    fn validate_and_clear(&self, active_items: &mut Vec<Item>) -> Result<ListTransition>;

    /* Commits checked items, then unchecks every item and keeps it. */
    fn validate_and_keep(&self, active_items: &mut Vec<Item>) -> Result<ListTransition>;
}

pub struct AggregationEngine<'a> {
    store: &'a dyn GroceryStoreOperations,
    clock: &'a dyn ClockOperations,
}

impl<'a> AggregationEngine<'a> {
    pub fn new(store: &'a dyn GroceryStoreOperations, clock: &'a dyn ClockOperations) -> Self {
        AggregationEngine { store, clock }
    }

    /*
     * Runs the commit and, when something was committed, persists the
     * list produced by `transform`. A failed commit returns before the
     * list is touched. If the commit succeeds but the list write fails, the
     * list stays transformed in memory, matching the committed history, and
     * the write error is returned.
     */
    fn transition<F>(&self, active_items: &mut Vec<Item>, transform: F) -> Result<ListTransition>
    where
        F: FnOnce(&mut Vec<Item>),
    {
        let result = self.commit_purchased(active_items)?;
        if result.is_empty() {
            return Ok(ListTransition::NothingToDo);
        }
        transform(active_items);
        if let Err(e) = self.store.set_items(active_items) {
            log::error!(
                "AggregationEngine: Committed {} purchases but could not save the list: {e}",
                result.committed
            );
            return Err(e);
        }
        Ok(ListTransition::Committed(result))
    }
}

impl AggregationOperations for AggregationEngine<'_> {
    fn commit_purchased(&self, active_items: &[Item]) -> Result<CommitResult> {
        let now = self.clock.now_millis();
        let new_records: Vec<HistoryRecord> = active_items
            .iter()
            .filter(|item| item.checked)
            .map(|item| HistoryRecord::from_item(item, now))
            .collect();

        if new_records.is_empty() {
            log::debug!("AggregationEngine: No checked items; nothing to commit.");
            return Ok(CommitResult {
                committed: 0,
                history_len: self.store.get_history().len(),
            });
        }

        let mut prospective_history = self.store.get_history();
        prospective_history.extend(new_records.iter().cloned());
        size_guard::assert_within_limit(&prospective_history, self.store.history_ceiling_mb())?;

        let mut counters = self.store.get_frequency_counters();
        for record in &new_records {
            counters.record(record);
        }

        self.store
            .commit_history_and_counters(&prospective_history, &counters)?;

        log::info!(
            "AggregationEngine: Committed {} purchases; history now holds {} records.",
            new_records.len(),
            prospective_history.len()
        );
        Ok(CommitResult {
            committed: new_records.len(),
            history_len: prospective_history.len(),
        })
    }

    fn validate_and_clear(&self, active_items: &mut Vec<Item>) -> Result<ListTransition> {
        self.transition(active_items, |items| items.retain(|item| !item.checked))
    }

    fn validate_and_keep(&self, active_items: &mut Vec<Item>) -> Result<ListTransition> {
        self.transition(active_items, |items| {
            for item in items.iter_mut() {
                item.checked = false;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::FrequencyCounters;
    use crate::core::storage_backend::{InMemoryStorageBackend, StorageBackendOperations};
    use crate::core::store::{CoreGroceryStore, HISTORY_KEY, StoreError};
    use std::sync::Arc;

    // 2024-03-15T14:30:05.123Z
    const NOW: i64 = 1_710_513_005_123;

    struct FixedClock(i64);

    impl ClockOperations for FixedClock {
        fn now_millis(&self) -> i64 {
            self.0
        }
    }

    fn item(id: i64, name: &str, quantity: u32, checked: bool) -> Item {
        let mut item = Item::new(id, name, quantity, 0);
        item.checked = checked;
        item
    }

    fn milk_and_bread() -> Vec<Item> {
        vec![item(1, "Milk", 2, true), item(2, "Bread", 1, false)]
    }

    fn setup() -> (Arc<InMemoryStorageBackend>, CoreGroceryStore, FixedClock) {
        let backend = Arc::new(InMemoryStorageBackend::new());
        let store = CoreGroceryStore::new(backend.clone());
        (backend, store, FixedClock(NOW))
    }

    #[test]
    fn test_commit_appends_checked_items_and_increments_counters() -> Result<()> {
        let (_backend, store, clock) = setup();
        let engine = AggregationEngine::new(&store, &clock);

        let result = engine.commit_purchased(&milk_and_bread())?;

        assert_eq!(result.committed, 1);
        assert_eq!(result.history_len, 1);
        let history = store.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].name, "Milk");
        assert_eq!(history[0].quantity, 2);
        assert_eq!(history[0].purchased_at, NOW);
        assert_eq!(history[0].date, "2024-03-15");
        assert_eq!(store.get_frequency_counters().get("Milk"), 2);
        assert_eq!(store.get_frequency_counters().get("Bread"), 0);
        Ok(())
    }

    #[test]
    fn test_commit_grows_history_by_checked_count_and_counters_by_quantity() -> Result<()> {
        let (_backend, store, clock) = setup();
        let engine = AggregationEngine::new(&store, &clock);
        engine.commit_purchased(&milk_and_bread())?;

        let batch = vec![
            item(3, "Milk", 3, true),
            item(4, "Eggs", 12, true),
            item(5, "Salt", 0, true),
            item(6, "Rice", 4, false),
        ];
        let before_total = store.get_frequency_counters().total();

        let result = engine.commit_purchased(&batch)?;

        assert_eq!(result.committed, 3);
        assert_eq!(store.get_history().len(), 1 + 3);
        let counters = store.get_frequency_counters();
        assert_eq!(counters.total(), before_total + 3 + 12 + 1);
        assert_eq!(counters.get("Milk"), 5);
        assert_eq!(counters.get("Salt"), 1);
        Ok(())
    }

    #[test]
    fn test_commit_with_nothing_checked_is_a_no_op() -> Result<()> {
        let (backend, store, clock) = setup();
        let engine = AggregationEngine::new(&store, &clock);

        let result = engine.commit_purchased(&[item(1, "Bread", 1, false)])?;

        assert!(result.is_empty());
        assert_eq!(backend.get(HISTORY_KEY).ok().flatten(), None);
        assert!(store.get_frequency_counters().is_empty());
        Ok(())
    }

    #[test]
    fn test_commit_truncates_long_fields() -> Result<()> {
        let (_backend, store, clock) = setup();
        let engine = AggregationEngine::new(&store, &clock);
        let mut long = item(1, &"a".repeat(500), 20_000, true);
        long.notes = "b".repeat(500);

        engine.commit_purchased(&[long])?;

        let record = &store.get_history()[0];
        assert_eq!(record.name.chars().count(), 60);
        assert_eq!(record.notes.chars().count(), 200);
        assert_eq!(record.quantity, 9999);
        // Counters follow the clamped record quantity but are themselves unbounded.
        assert_eq!(store.get_frequency_counters().get(&record.name), 9999);
        Ok(())
    }

    #[test]
    fn test_counters_are_not_clamped_across_commits() -> Result<()> {
        let (_backend, store, clock) = setup();
        let engine = AggregationEngine::new(&store, &clock);
        engine.commit_purchased(&[item(1, "Water", 9999, true)])?;
        engine.commit_purchased(&[item(2, "Water", 9999, true)])?;
        assert_eq!(store.get_frequency_counters().get("Water"), 19_998);
        Ok(())
    }

    #[test]
    fn test_commit_refused_when_history_exceeds_default_ceiling() {
        let (backend, store, clock) = setup();
        // Roughly 6 MB of existing history, written around the guard.
        let filler: Vec<HistoryRecord> = (0..20_000)
            .map(|i| {
                let mut seed = item(i, &format!("Filler {}", rand::random::<u32>()), 1, true);
                seed.notes = "n".repeat(200);
                HistoryRecord::from_item(&seed, NOW)
            })
            .collect();
        let raw = serde_json::to_string(&filler).expect("filler should encode");
        backend
            .set(HISTORY_KEY, &raw)
            .expect("raw write should succeed");
        let counters_before = store.get_frequency_counters();

        let engine = AggregationEngine::new(&store, &clock);
        let result = engine.commit_purchased(&milk_and_bread());

        assert!(matches!(result, Err(StoreError::StorageFull { .. })));
        assert_eq!(
            backend.get(HISTORY_KEY).ok().flatten().as_deref(),
            Some(raw.as_str())
        );
        assert_eq!(store.get_frequency_counters(), counters_before);
    }

    #[test]
    fn test_commit_refused_when_batch_pushes_history_over_ceiling() -> Result<()> {
        let backend = Arc::new(InMemoryStorageBackend::new());
        let store = CoreGroceryStore::with_history_ceiling(backend.clone(), 0.01);
        let clock = FixedClock(NOW);
        let engine = AggregationEngine::new(&store, &clock);
        engine.commit_purchased(&milk_and_bread())?;

        let batch: Vec<Item> = (0..100)
            .map(|i| {
                let mut big = item(10 + i, &format!("Big {i}"), 1, true);
                big.notes = "x".repeat(200);
                big
            })
            .collect();
        let result = engine.commit_purchased(&batch);

        assert!(matches!(result, Err(ref e) if e.is_storage_full()));
        assert_eq!(store.get_history().len(), 1);
        assert_eq!(
            store.get_frequency_counters(),
            [("Milk".to_string(), 2)].into_iter().collect::<FrequencyCounters>()
        );
        Ok(())
    }

    #[test]
    fn test_validate_and_clear_removes_checked_items() -> Result<()> {
        let (_backend, store, clock) = setup();
        let engine = AggregationEngine::new(&store, &clock);
        let mut items = milk_and_bread();

        let outcome = engine.validate_and_clear(&mut items)?;

        assert!(matches!(outcome, ListTransition::Committed(r) if r.committed == 1));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Bread");
        assert_eq!(store.get_items(), items);
        assert_eq!(store.get_frequency_counters().get("Milk"), 2);
        Ok(())
    }

    #[test]
    fn test_validate_and_keep_unchecks_all_items() -> Result<()> {
        let (_backend, store, clock) = setup();
        let engine = AggregationEngine::new(&store, &clock);
        let mut items = milk_and_bread();

        let outcome = engine.validate_and_keep(&mut items)?;

        assert!(matches!(outcome, ListTransition::Committed(_)));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Milk");
        assert_eq!(items[0].quantity, 2);
        assert!(items.iter().all(|i| !i.checked));
        assert_eq!(store.get_items(), items);
        assert_eq!(store.get_history().len(), 1);
        Ok(())
    }

    #[test]
    fn test_transitions_report_nothing_to_do_without_checked_items() -> Result<()> {
        let (_backend, store, clock) = setup();
        let engine = AggregationEngine::new(&store, &clock);
        let mut items = vec![item(1, "Bread", 1, false)];

        assert_eq!(
            engine.validate_and_clear(&mut items)?,
            ListTransition::NothingToDo
        );
        assert_eq!(
            engine.validate_and_keep(&mut items)?,
            ListTransition::NothingToDo
        );
        assert_eq!(items.len(), 1);
        assert!(store.get_items().is_empty());
        Ok(())
    }

    #[test]
    fn test_failed_commit_leaves_list_untouched() {
        let backend = Arc::new(InMemoryStorageBackend::new());
        let store = CoreGroceryStore::with_history_ceiling(backend, 0.0);
        let clock = FixedClock(NOW);
        let engine = AggregationEngine::new(&store, &clock);
        let mut big = item(1, "Milk", 1, true);
        big.notes = "n".repeat(200);
        let mut items: Vec<Item> = (0..100)
            .map(|i| {
                let mut copy = big.clone();
                copy.id = i;
                copy
            })
            .collect();
        let before = items.clone();

        let result = engine.validate_and_clear(&mut items);

        assert!(matches!(result, Err(ref e) if e.is_storage_full()));
        assert_eq!(items, before);
    }
}
