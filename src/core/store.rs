/*
 * Typed access to the persisted grocery collections. Each logical
 * collection lives in its own backend slot: the active items, the
 * frequency counters, the purchase history, the theme preference and the
 * one-time safety-alert flag. There is no shared schema between slots.
 *
 * Reads never fail. A missing, empty or malformed slot decodes to the
 * collection's empty default and the decode failure is only logged. Writes
 * of the history slot pass through the size guard first; a rejected write
 * leaves the previous slot contents untouched.
 *
 * `GroceryStoreOperations` is the seam used by the aggregation engine and
 * the application logic, which allows mock stores in tests.
 */
use super::models::{FrequencyCounters, HistoryRecord, Item, Theme};
use super::size_guard::{self, DEFAULT_HISTORY_CEILING_MB, DataSize, SizeGuardError};
use super::storage_backend::{BackendError, StorageBackendOperations};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub const ITEMS_KEY: &str = "groceryItems";
pub const FREQUENCY_KEY: &str = "topPurchases";
pub const HISTORY_KEY: &str = "purchaseHistory";
pub const THEME_KEY: &str = "theme";
pub const SAFETY_ALERT_KEY: &str = "safetyAlertSeen";

const SAFETY_ALERT_SEEN_VALUE: &str = "true";

#[derive(Debug)]
pub enum StoreError {
    StorageFull { size: DataSize, ceiling_mb: f64 },
    Backend(BackendError),
    Serde(serde_json::Error),
}

impl StoreError {
    pub fn is_storage_full(&self) -> bool {
        matches!(self, StoreError::StorageFull { .. })
    }
}

impl From<SizeGuardError> for StoreError {
    fn from(err: SizeGuardError) -> Self {
        match err {
            SizeGuardError::StorageFull { size, ceiling_mb } => {
                StoreError::StorageFull { size, ceiling_mb }
            }
        }
    }
}

impl From<BackendError> for StoreError {
    fn from(err: BackendError) -> Self {
        StoreError::Backend(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::StorageFull { size, ceiling_mb } => write!(
                f,
                "Storage full: purchase history would take {} MB (limit {ceiling_mb} MB). Export and clear the history.",
                size.megabytes
            ),
            StoreError::Backend(e) => write!(f, "Storage backend error: {e}"),
            StoreError::Serde(e) => write!(f, "Serialization error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Backend(e) => Some(e),
            StoreError::Serde(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub trait GroceryStoreOperations: Send + Sync {
    fn get_items(&self) -> Vec<Item>;
    fn set_items(&self, items: &[Item]) -> Result<()>;

    fn get_frequency_counters(&self) -> FrequencyCounters;
    fn set_frequency_counters(&self, counters: &FrequencyCounters) -> Result<()>;
    fn reset_frequency_counters(&self) -> Result<()>;

    fn get_history(&self) -> Vec<HistoryRecord>;
    /* Guarded: fails with `StorageFull` when `history` exceeds the ceiling. */
    fn set_history(&self, history: &[HistoryRecord]) -> Result<DataSize>;
    fn reset_history(&self) -> Result<()>;

    /*
     * Writes the history (guarded) and then the counters. If the counters
     * cannot be written the history slot is restored, so either both are
     * applied or neither is.
     */
    fn commit_history_and_counters(
        &self,
        history: &[HistoryRecord],
        counters: &FrequencyCounters,
    ) -> Result<()>;

    fn get_theme(&self) -> Theme;
    fn set_theme(&self, theme: Theme) -> Result<()>;

    fn get_safety_alert_seen(&self) -> bool;
    fn set_safety_alert_seen(&self) -> Result<()>;

    fn reset_all(&self) -> Result<()>;

    fn history_ceiling_mb(&self) -> f64;
}

pub struct CoreGroceryStore {
    backend: Arc<dyn StorageBackendOperations>,
    history_ceiling_mb: f64,
}

impl CoreGroceryStore {
    pub fn new(backend: Arc<dyn StorageBackendOperations>) -> Self {
        Self::with_history_ceiling(backend, DEFAULT_HISTORY_CEILING_MB)
    }

    pub fn with_history_ceiling(
        backend: Arc<dyn StorageBackendOperations>,
        history_ceiling_mb: f64,
    ) -> Self {
        log::debug!("CoreGroceryStore: Opened with history ceiling {history_ceiling_mb} MB.");
        CoreGroceryStore {
            backend,
            history_ceiling_mb,
        }
    }

    /*
     * Decodes the JSON slot `key`, substituting `T::default()` when the slot
     * is absent, blank, unreadable or malformed.
     */
    fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.backend.get(key) {
            Ok(Some(raw)) if !raw.trim().is_empty() => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!(
                        "CoreGroceryStore: Slot '{key}' is malformed ({e}); using empty default."
                    );
                    T::default()
                }
            },
            Ok(_) => {
                log::trace!("CoreGroceryStore: Slot '{key}' is empty; using default.");
                T::default()
            }
            Err(e) => {
                log::warn!("CoreGroceryStore: Could not read slot '{key}' ({e}); using default.");
                T::default()
            }
        }
    }

    fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let encoded = serde_json::to_string(value)?;
        self.backend.set(key, &encoded)?;
        log::trace!(
            "CoreGroceryStore: Saved slot '{key}' ({} bytes).",
            encoded.len()
        );
        Ok(())
    }

    fn restore_raw(&self, key: &str, previous: Option<String>) {
        let restored = match previous {
            Some(raw) => self.backend.set(key, &raw),
            None => self.backend.remove(key),
        };
        if let Err(e) = restored {
            log::error!("CoreGroceryStore: Failed to restore slot '{key}' after a failed commit: {e}");
        }
    }
}

impl GroceryStoreOperations for CoreGroceryStore {
    fn get_items(&self) -> Vec<Item> {
        self.load_or_default(ITEMS_KEY)
    }

    fn set_items(&self, items: &[Item]) -> Result<()> {
        self.save_json(ITEMS_KEY, items)
    }

    fn get_frequency_counters(&self) -> FrequencyCounters {
        self.load_or_default(FREQUENCY_KEY)
    }

    fn set_frequency_counters(&self, counters: &FrequencyCounters) -> Result<()> {
        self.save_json(FREQUENCY_KEY, counters)
    }

    fn reset_frequency_counters(&self) -> Result<()> {
        log::info!("CoreGroceryStore: Resetting frequency counters.");
        self.save_json(FREQUENCY_KEY, &FrequencyCounters::new())
    }

    fn get_history(&self) -> Vec<HistoryRecord> {
        self.load_or_default(HISTORY_KEY)
    }

    fn set_history(&self, history: &[HistoryRecord]) -> Result<DataSize> {
        let size = size_guard::assert_within_limit(history, self.history_ceiling_mb)?;
        self.save_json(HISTORY_KEY, history)?;
        log::debug!(
            "CoreGroceryStore: Saved {} history records ({} MB).",
            history.len(),
            size.megabytes
        );
        Ok(size)
    }

    fn reset_history(&self) -> Result<()> {
        log::info!("CoreGroceryStore: Resetting purchase history.");
        self.save_json::<[HistoryRecord]>(HISTORY_KEY, &[])
    }

    fn commit_history_and_counters(
        &self,
        history: &[HistoryRecord],
        counters: &FrequencyCounters,
    ) -> Result<()> {
        let previous_history = self.backend.get(HISTORY_KEY)?;
        self.set_history(history)?;
        if let Err(e) = self.set_frequency_counters(counters) {
            log::error!(
                "CoreGroceryStore: Writing frequency counters failed ({e}); rolling back history."
            );
            self.restore_raw(HISTORY_KEY, previous_history);
            return Err(e);
        }
        Ok(())
    }

    fn get_theme(&self) -> Theme {
        match self.backend.get(THEME_KEY) {
            Ok(Some(raw)) => Theme::parse(&raw),
            Ok(None) => Theme::default(),
            Err(e) => {
                log::warn!("CoreGroceryStore: Could not read theme ({e}); using light.");
                Theme::default()
            }
        }
    }

    fn set_theme(&self, theme: Theme) -> Result<()> {
        self.backend.set(THEME_KEY, theme.as_str())?;
        log::debug!("CoreGroceryStore: Theme set to '{}'.", theme.as_str());
        Ok(())
    }

    fn get_safety_alert_seen(&self) -> bool {
        match self.backend.get(SAFETY_ALERT_KEY) {
            Ok(value) => value.as_deref() == Some(SAFETY_ALERT_SEEN_VALUE),
            Err(e) => {
                log::warn!("CoreGroceryStore: Could not read safety alert flag ({e}).");
                false
            }
        }
    }

    fn set_safety_alert_seen(&self) -> Result<()> {
        self.backend
            .set(SAFETY_ALERT_KEY, SAFETY_ALERT_SEEN_VALUE)
            .map_err(StoreError::from)
    }

    /*
     * Removes every data slot (items, counters, history, safety flag). The
     * theme is a display preference and is kept. All removals are attempted
     * even if one fails; the first failure is returned.
     */
    fn reset_all(&self) -> Result<()> {
        log::info!("CoreGroceryStore: Resetting all stored data.");
        let mut first_error = None;
        for key in [ITEMS_KEY, FREQUENCY_KEY, HISTORY_KEY, SAFETY_ALERT_KEY] {
            if let Err(e) = self.backend.remove(key) {
                log::error!("CoreGroceryStore: Failed to remove slot '{key}': {e}");
                first_error.get_or_insert(StoreError::Backend(e));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn history_ceiling_mb(&self) -> f64 {
        self.history_ceiling_mb
    }
}
