/*
 * This module consolidates the core, platform-agnostic logic of the application:
 * the data model, the size guard protecting the purchase history, the key-value
 * store over a pluggable storage backend, the aggregation engine that commits
 * checked items into history and frequency counters, statistics, CSV exports,
 * the autosave timer, configuration and path utilities.
 */
pub mod aggregation;
pub mod autosave;
pub mod clock;
pub mod config;
pub mod export;
pub mod models;
pub mod path_utils;
pub mod size_guard;
pub mod statistics;
pub mod storage_backend;
pub mod store;

// Re-export key structures and enums
pub use models::{
    DEFAULT_CATEGORY, FrequencyCounters, HistoryRecord, Item, MAX_NAME_CHARS, MAX_NOTES_CHARS,
    MAX_QUANTITY, Theme, Timestamp, ValidationError, validate_quantity,
};

pub use clock::{ClockOperations, SystemClock};

pub use size_guard::{DataSize, SizeGuardError, assert_within_limit, estimate_size};

// Re-export storage related items
pub use storage_backend::{
    BackendError, FileStorageBackend, InMemoryStorageBackend, StorageBackendOperations,
};
pub use store::{CoreGroceryStore, GroceryStoreOperations, StoreError};

pub use aggregation::{AggregationEngine, AggregationOperations, CommitResult, ListTransition};

pub use statistics::{PurchaseStats, history_by_day};

pub use export::{
    ExportDocument, export_active_list, export_day_history, export_frequency,
    export_full_history, export_stats, write_export,
};

pub use autosave::RepeatingTimer;

// Re-export config related items
pub use config::{
    AppConfig, ConfigError, ConfigManagerOperations, CoreConfigManager,
    DEFAULT_SAFETY_ALERT_HISTORY_LEN,
};
