use crate::core::{
    self, AggregationEngine, AggregationOperations, ClockOperations, DEFAULT_CATEGORY,
    ExportDocument, FrequencyCounters, GroceryStoreOperations, HistoryRecord, Item,
    ListTransition, PurchaseStats, StoreError, Theme, ValidationError,
};
use std::collections::HashSet;
use std::io;
use std::sync::Arc;

pub const APP_NAME: &str = "GroceryKeeper";

#[derive(Debug)]
pub enum AppLogicError {
    Validation(ValidationError),
    Store(StoreError),
    ItemNotFound(i64),
    Io(io::Error),
}

impl AppLogicError {
    pub fn is_storage_full(&self) -> bool {
        matches!(self, AppLogicError::Store(e) if e.is_storage_full())
    }
}

impl From<ValidationError> for AppLogicError {
    fn from(err: ValidationError) -> Self {
        AppLogicError::Validation(err)
    }
}

impl From<StoreError> for AppLogicError {
    fn from(err: StoreError) -> Self {
        AppLogicError::Store(err)
    }
}

impl From<io::Error> for AppLogicError {
    fn from(err: io::Error) -> Self {
        AppLogicError::Io(err)
    }
}

impl std::fmt::Display for AppLogicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppLogicError::Validation(e) => write!(f, "Invalid item: {e}"),
            AppLogicError::Store(e) => write!(f, "{e}"),
            AppLogicError::ItemNotFound(id) => write!(f, "No item with id {id} in the list"),
            AppLogicError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for AppLogicError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppLogicError::Validation(e) => Some(e),
            AppLogicError::Store(e) => Some(e),
            AppLogicError::Io(e) => Some(e),
            AppLogicError::ItemNotFound(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppLogicError>;

/* User input for a new list entry. Text fields are trimmed before validation. */
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub name: String,
    pub category: String,
    pub quantity: u32,
    pub notes: String,
}

impl NewItem {
    pub fn named(name: impl Into<String>) -> Self {
        NewItem {
            name: name.into(),
            quantity: 1,
            ..NewItem::default()
        }
    }
}

/* Partial edit of an existing item. `None` leaves the field unchanged. */
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<u32>,
    pub notes: Option<String>,
}

/* Raised once at startup when the history grows large enough to risk the ceiling. */
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyWarning {
    pub records: usize,
    pub megabytes: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AutosaveOutcome {
    /* The active list is empty, nothing was written. */
    Skipped,
    Saved,
    StorageFull { megabytes: f64, ceiling_mb: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

fn trimmed_category(category: &str) -> String {
    let category = category.trim();
    if category.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        category.to_string()
    }
}

/*
 * The in-memory session a UI drives. Holds the active list plus cached
 * copies of the counters and history, and writes every mutation through to
 * the store. Commits go through the aggregation engine; the caches are
 * re-read from the store after every commit attempt so they always match
 * what was persisted.
 */
pub struct GroceryAppLogic {
    pub(crate) items: Vec<Item>,
    pub(crate) counters: FrequencyCounters,
    pub(crate) history: Vec<HistoryRecord>,
    pub(crate) theme: Theme,
    pub(crate) safety_alert_history_len: usize,
    store: Arc<dyn GroceryStoreOperations>,
    clock: Arc<dyn ClockOperations>,
}

impl GroceryAppLogic {
    pub fn new(store: Arc<dyn GroceryStoreOperations>, clock: Arc<dyn ClockOperations>) -> Self {
        GroceryAppLogic {
            items: Vec::new(),
            counters: FrequencyCounters::new(),
            history: Vec::new(),
            theme: Theme::default(),
            safety_alert_history_len: core::DEFAULT_SAFETY_ALERT_HISTORY_LEN,
            store,
            clock,
        }
    }

    pub fn with_safety_alert_threshold(mut self, history_len: usize) -> Self {
        self.safety_alert_history_len = history_len;
        self
    }

    /*
     * Reads every collection from the store. If the history holds more
     * records than the safety threshold and the alert was never shown, the
     * alert flag is set and a warning is returned for the UI to display.
     */
    pub fn load(&mut self) -> Option<SafetyWarning> {
        self.items = self.store.get_items();
        self.counters = self.store.get_frequency_counters();
        self.history = self.store.get_history();
        self.theme = self.store.get_theme();
        if self.reassign_duplicate_ids() > 0 {
            if let Err(e) = self.persist_items() {
                log::error!("GroceryAppLogic: Could not persist reassigned item ids: {e}");
            }
        }
        log::info!(
            "GroceryAppLogic: Loaded {} items, {} counters, {} history records.",
            self.items.len(),
            self.counters.len(),
            self.history.len()
        );

        if self.history.len() <= self.safety_alert_history_len || self.store.get_safety_alert_seen()
        {
            return None;
        }

        let size = core::estimate_size(&self.history);
        log::warn!(
            "GroceryAppLogic: History holds {} records ({} MB); raising the safety alert.",
            self.history.len(),
            size.megabytes
        );
        if let Err(e) = self.store.set_safety_alert_seen() {
            log::error!("GroceryAppLogic: Could not persist the safety alert flag: {e}");
        }
        Some(SafetyWarning {
            records: self.history.len(),
            megabytes: size.megabytes,
        })
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn history(&self) -> &[HistoryRecord] {
        &self.history
    }

    pub fn counters(&self) -> &FrequencyCounters {
        &self.counters
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    fn persist_items(&self) -> Result<()> {
        self.store.set_items(&self.items)?;
        Ok(())
    }

    fn refresh_derived(&mut self) {
        self.history = self.store.get_history();
        self.counters = self.store.get_frequency_counters();
    }

    fn position_of(&self, id: i64) -> Result<usize> {
        self.items
            .iter()
            .position(|item| item.id == id)
            .ok_or(AppLogicError::ItemNotFound(id))
    }

    /*
     * The creation timestamp, bumped past the largest id already in use. When
     * the largest id is `i64::MAX` the smallest unused id below it is taken.
     */
    fn next_item_id(&self, now: i64) -> i64 {
        match self.items.iter().map(|item| item.id).max() {
            Some(max_id) if max_id >= now => match max_id.checked_add(1) {
                Some(id) => id,
                None => self.smallest_unused_id(),
            },
            _ => now,
        }
    }

    fn smallest_unused_id(&self) -> i64 {
        let used: HashSet<i64> = self.items.iter().map(|item| item.id).collect();
        (0..).find(|id| !used.contains(id)).unwrap_or_default()
    }

    /*
     * Stored lists are trusted to hold unique ids, but a hand-edited or
     * corrupted slot may not. A colliding item gets a fresh id past the
     * largest one in use.
     */
    fn reassign_duplicate_ids(&mut self) -> usize {
        let mut seen = HashSet::new();
        let mut colliding = Vec::new();
        for (index, item) in self.items.iter().enumerate() {
            if !seen.insert(item.id) {
                colliding.push(index);
            }
        }
        for &index in &colliding {
            let fresh = self.next_item_id(i64::MIN);
            log::warn!(
                "GroceryAppLogic: Item '{}' shares id {}; reassigned to {fresh}.",
                self.items[index].name,
                self.items[index].id
            );
            self.items[index].id = fresh;
        }
        colliding.len()
    }

    pub fn add_item(&mut self, new_item: NewItem) -> Result<i64> {
        let now = self.clock.now_millis();
        let mut item = Item::new(
            self.next_item_id(now),
            new_item.name.trim(),
            new_item.quantity,
            now,
        );
        item.category = trimmed_category(&new_item.category);
        item.notes = new_item.notes.trim().to_string();
        item.validate()?;

        let id = item.id;
        log::debug!("GroceryAppLogic: Adding item '{}' with id {id}.", item.name);
        self.items.push(item);
        self.persist_items()?;
        Ok(id)
    }

    /* Flips the checked flag and returns the new state. */
    pub fn toggle_item(&mut self, id: i64) -> Result<bool> {
        let index = self.position_of(id)?;
        let item = &mut self.items[index];
        item.checked = !item.checked;
        let checked = item.checked;
        self.persist_items()?;
        Ok(checked)
    }

    pub fn delete_item(&mut self, id: i64) -> Result<Item> {
        let index = self.position_of(id)?;
        let removed = self.items.remove(index);
        log::debug!("GroceryAppLogic: Deleted item '{}' ({id}).", removed.name);
        self.persist_items()?;
        Ok(removed)
    }

    pub fn update_quantity(&mut self, id: i64, quantity: u32) -> Result<()> {
        core::validate_quantity(quantity)?;
        let index = self.position_of(id)?;
        self.items[index].quantity = quantity;
        self.persist_items()
    }

    pub fn update_item(&mut self, id: i64, update: ItemUpdate) -> Result<()> {
        let index = self.position_of(id)?;
        let mut edited = self.items[index].clone();
        if let Some(name) = update.name {
            edited.name = name.trim().to_string();
        }
        if let Some(category) = update.category {
            edited.category = trimmed_category(&category);
        }
        if let Some(quantity) = update.quantity {
            edited.quantity = quantity;
        }
        if let Some(notes) = update.notes {
            edited.notes = notes.trim().to_string();
        }
        edited.validate()?;

        self.items[index] = edited;
        self.persist_items()
    }

    /* Empties the active list without touching the history. */
    pub fn clear_all(&mut self) -> Result<usize> {
        let removed = self.items.len();
        self.items.clear();
        self.persist_items()?;
        log::info!("GroceryAppLogic: Cleared {removed} items from the list.");
        Ok(removed)
    }

    pub fn clear_checked(&mut self) -> Result<ListTransition> {
        self.validate_and_clear()
    }

    /* Unchecks every item without committing. Returns false if nothing was checked. */
    pub fn reset_checked(&mut self) -> Result<bool> {
        if self.checked_count() == 0 {
            return Ok(false);
        }
        for item in self.items.iter_mut() {
            item.checked = false;
        }
        self.persist_items()?;
        Ok(true)
    }

    pub fn validate_and_keep(&mut self) -> Result<ListTransition> {
        let engine = AggregationEngine::new(self.store.as_ref(), self.clock.as_ref());
        let transition = engine.validate_and_keep(&mut self.items);
        self.after_transition(transition)
    }

    pub fn validate_and_clear(&mut self) -> Result<ListTransition> {
        let engine = AggregationEngine::new(self.store.as_ref(), self.clock.as_ref());
        let transition = engine.validate_and_clear(&mut self.items);
        self.after_transition(transition)
    }

    /*
     * The caches are re-read even when the transition failed. A commit can
     * succeed and the list write after it fail, and stale caches would then
     * let the next autosave overwrite the committed history and counters.
     */
    fn after_transition(
        &mut self,
        transition: std::result::Result<ListTransition, StoreError>,
    ) -> Result<ListTransition> {
        self.refresh_derived();
        if let Err(e) = &transition {
            log::error!("GroceryAppLogic: List transition failed: {e}");
        }
        transition.map_err(AppLogicError::from)
    }

    pub fn reset_frequency_counters(&mut self) -> Result<()> {
        self.store.reset_frequency_counters()?;
        self.counters = FrequencyCounters::new();
        Ok(())
    }

    pub fn reset_history(&mut self) -> Result<()> {
        self.store.reset_history()?;
        self.history.clear();
        Ok(())
    }

    /* Drops items, counters, history and the safety flag. The theme survives. */
    pub fn reset_all(&mut self) -> Result<()> {
        self.store.reset_all()?;
        self.items.clear();
        self.counters = FrequencyCounters::new();
        self.history.clear();
        log::info!("GroceryAppLogic: All grocery data reset.");
        Ok(())
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.store.set_theme(theme)?;
        self.theme = theme;
        Ok(())
    }

    pub fn toggle_theme(&mut self) -> Result<Theme> {
        let theme = self.theme.toggled();
        self.set_theme(theme)?;
        Ok(theme)
    }

    /*
     * Periodic safety-net save. Runs only when the active list is non-empty
     * and re-persists items, counters and history. A history that no longer
     * fits under the ceiling is reported, not dropped.
     */
    pub fn autosave(&self) -> Result<AutosaveOutcome> {
        if self.items.is_empty() {
            return Ok(AutosaveOutcome::Skipped);
        }
        self.store.set_items(&self.items)?;
        self.store.set_frequency_counters(&self.counters)?;
        match self.store.set_history(&self.history) {
            Ok(_) => {
                log::trace!("GroceryAppLogic: Autosave complete.");
                Ok(AutosaveOutcome::Saved)
            }
            Err(StoreError::StorageFull { size, ceiling_mb }) => {
                log::warn!(
                    "GroceryAppLogic: Autosave refused, history is {} MB (limit {ceiling_mb} MB).",
                    size.megabytes
                );
                Ok(AutosaveOutcome::StorageFull {
                    megabytes: size.megabytes,
                    ceiling_mb,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn stats(&self) -> PurchaseStats {
        PurchaseStats::from_history(&self.history)
    }

    pub fn history_by_day(&self) -> Vec<(String, Vec<&HistoryRecord>)> {
        core::history_by_day(&self.history)
    }

    pub fn export_active_list(&self) -> Option<ExportDocument> {
        if self.items.is_empty() {
            return None;
        }
        Some(core::export_active_list(&self.items, self.clock.now_millis()))
    }

    pub fn export_full_history(&self) -> Option<ExportDocument> {
        if self.history.is_empty() {
            return None;
        }
        Some(core::export_full_history(
            &self.history,
            self.clock.now_millis(),
        ))
    }

    pub fn export_day_history(&self, day: &str) -> Option<ExportDocument> {
        if !self.history.iter().any(|record| record.is_on_day(day)) {
            return None;
        }
        Some(core::export_day_history(&self.history, day))
    }

    pub fn export_frequency(&self) -> Option<ExportDocument> {
        if self.counters.is_empty() {
            return None;
        }
        Some(core::export_frequency(
            &self.counters,
            self.clock.now_millis(),
        ))
    }

    pub fn export_stats(&self) -> ExportDocument {
        core::export_stats(&self.stats(), self.clock.now_millis())
    }

    pub fn checked_count(&self) -> usize {
        self.items.iter().filter(|item| item.checked).count()
    }

    pub fn checked_quantity(&self) -> u64 {
        self.items
            .iter()
            .filter(|item| item.checked)
            .map(Item::effective_quantity)
            .sum()
    }

    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(Item::effective_quantity).sum()
    }

    pub fn is_complete(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|item| item.checked)
    }

    /*
     * Items matching `search` (case-insensitive against name, category and
     * notes, or a substring of the quantity), sorted by the given key.
     */
    pub fn visible_items(&self, search: &str, key: SortKey, order: SortOrder) -> Vec<&Item> {
        let needle = search.to_lowercase();
        let mut visible: Vec<&Item> = self
            .items
            .iter()
            .filter(|item| {
                item.name.to_lowercase().contains(&needle)
                    || item.category.to_lowercase().contains(&needle)
                    || item.notes.to_lowercase().contains(&needle)
                    || item.quantity.to_string().contains(search)
            })
            .collect();

        visible.sort_by(|a, b| {
            let ordering = match key {
                SortKey::Name => a.name.cmp(&b.name),
                SortKey::Category => a.category.cmp(&b.category),
            };
            match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
        visible
    }
}
