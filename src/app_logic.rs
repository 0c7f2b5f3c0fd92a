/*
 * This module provides the application logic layer, centered around
 * `GroceryAppLogic`, the in-memory session a UI drives. Unit tests for
 * `GroceryAppLogic` are in `handler_tests.rs`.
 */
pub mod handler;


pub use handler::{
    APP_NAME, AppLogicError, AutosaveOutcome, GroceryAppLogic, ItemUpdate, NewItem,
    SafetyWarning, SortKey, SortOrder,
};
