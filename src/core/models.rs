/*
 * Data model shared by every part of the core: the active list `Item`, the
 * immutable `HistoryRecord` created when a checked item is committed, the
 * cumulative `FrequencyCounters` tally and the `Theme` preference. It also
 * holds the boundary constants (name/notes length, quantity bounds) and the
 * timestamp helpers used to derive calendar days and the fr-FR display
 * strings found in exports.
 *
 * Field names serialize in camelCase so that persisted slots keep the
 * `addedAt` / `purchasedAt` layout.
 */
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;
use time::macros::format_description;

pub const MAX_NAME_CHARS: usize = 60;
pub const MAX_NOTES_CHARS: usize = 200;
pub const MIN_QUANTITY: u32 = 1;
pub const MAX_QUANTITY: u32 = 9999;
pub const DEFAULT_CATEGORY: &str = "Autres";

/* Milliseconds since the Unix epoch. */
pub type Timestamp = i64;

#[derive(Debug)]
pub enum ValidationError {
    EmptyName,
    NameTooLong(usize),
    NotesTooLong(usize),
    QuantityOutOfRange(u32),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyName => write!(f, "Item name must not be empty"),
            ValidationError::NameTooLong(len) => write!(
                f,
                "Item name is {len} characters long (max {MAX_NAME_CHARS})"
            ),
            ValidationError::NotesTooLong(len) => write!(
                f,
                "Item notes are {len} characters long (max {MAX_NOTES_CHARS})"
            ),
            ValidationError::QuantityOutOfRange(q) => write!(
                f,
                "Quantity {q} is outside {MIN_QUANTITY}..={MAX_QUANTITY}"
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/*
 * Returns at most `max_chars` characters of `text`. Counting is done on
 * chars, never bytes, so multi-byte names are never cut mid-character.
 */
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

pub fn validate_quantity(quantity: u32) -> Result<(), ValidationError> {
    if (MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(ValidationError::QuantityOutOfRange(quantity))
    }
}

/* An entry of the active list. */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub added_at: Timestamp,
}

fn default_quantity() -> u32 {
    MIN_QUANTITY
}

impl Item {
    pub fn new(id: i64, name: impl Into<String>, quantity: u32, added_at: Timestamp) -> Self {
        Item {
            id,
            name: name.into(),
            category: default_category(),
            quantity,
            notes: String::new(),
            checked: false,
            added_at,
        }
    }

    /*
     * Checks the boundary invariants every item must satisfy before it
     * reaches the store: a non-empty name of at most 60 characters, notes of
     * at most 200 characters and a quantity within 1..=9999.
     */
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let name_len = self.name.chars().count();
        if name_len > MAX_NAME_CHARS {
            return Err(ValidationError::NameTooLong(name_len));
        }
        let notes_len = self.notes.chars().count();
        if notes_len > MAX_NOTES_CHARS {
            return Err(ValidationError::NotesTooLong(notes_len));
        }
        validate_quantity(self.quantity)
    }

    /* Quantity used by tallies: a zero quantity counts as one. */
    pub fn effective_quantity(&self) -> u64 {
        if self.quantity == 0 {
            1
        } else {
            u64::from(self.quantity)
        }
    }

    pub fn display_category(&self) -> &str {
        if self.category.is_empty() {
            DEFAULT_CATEGORY
        } else {
            &self.category
        }
    }
}

/*
 * A committed purchase. Created only by the aggregation engine, never
 * mutated afterwards. `date` is the ISO calendar day of `purchased_at`.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub notes: String,
    pub purchased_at: Timestamp,
    #[serde(default)]
    pub date: String,
}

impl HistoryRecord {
    /*
     * Builds the normalized record for a committed item: name and notes are
     * cut to their maximum lengths and the quantity is clamped to 9999.
     */
    pub fn from_item(item: &Item, purchased_at: Timestamp) -> Self {
        HistoryRecord {
            name: truncate_chars(&item.name, MAX_NAME_CHARS),
            category: item.category.clone(),
            quantity: item.quantity.min(MAX_QUANTITY),
            notes: truncate_chars(&item.notes, MAX_NOTES_CHARS),
            purchased_at,
            date: iso_day(purchased_at),
        }
    }

    pub fn effective_quantity(&self) -> u64 {
        if self.quantity == 0 {
            1
        } else {
            u64::from(self.quantity)
        }
    }

    /* Calendar day of the purchase, falling back to `purchased_at` for records without one. */
    pub fn day(&self) -> String {
        if self.date.is_empty() {
            iso_day(self.purchased_at)
        } else {
            self.date.clone()
        }
    }

    pub fn is_on_day(&self, day: &str) -> bool {
        self.date == day || iso_day(self.purchased_at) == day
    }

    pub fn display_category(&self) -> &str {
        if self.category.is_empty() {
            DEFAULT_CATEGORY
        } else {
            &self.category
        }
    }
}

/*
 * Cumulative purchased quantity per item name. Only ever incremented; the
 * tally is not clamped, so a name can exceed 9999 over time.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrequencyCounters(BTreeMap<String, u64>);

impl FrequencyCounters {
    pub fn new() -> Self {
        FrequencyCounters(BTreeMap::new())
    }

    pub fn record(&mut self, record: &HistoryRecord) {
        *self.0.entry(record.name.clone()).or_insert(0) += record.effective_quantity();
    }

    pub fn get(&self, name: &str) -> u64 {
        self.0.get(name).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    /* Entries sorted by count, highest first. Equal counts keep name order. */
    pub fn ranked(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> = self
            .0
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }
}

impl FromIterator<(String, u64)> for FrequencyCounters {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        FrequencyCounters(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /* Unknown values fall back to the light theme. */
    pub fn parse(value: &str) -> Theme {
        match value.trim() {
            "dark" => Theme::Dark,
            _ => Theme::Light,
        }
    }

    pub fn toggled(&self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

fn to_datetime(timestamp: Timestamp) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp) * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

// Calendar days and times are derived in UTC.
pub fn iso_day(timestamp: Timestamp) -> String {
    let format = format_description!("[year]-[month]-[day]");
    to_datetime(timestamp).format(&format).unwrap_or_default()
}

pub fn display_date(timestamp: Timestamp) -> String {
    let format = format_description!("[day]/[month]/[year]");
    to_datetime(timestamp).format(&format).unwrap_or_default()
}

pub fn display_time(timestamp: Timestamp) -> String {
    let format = format_description!("[hour]:[minute]:[second]");
    to_datetime(timestamp).format(&format).unwrap_or_default()
}
