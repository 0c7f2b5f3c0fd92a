/*
 * Summary figures computed from the purchase history: totals, distinct
 * items and days, the daily average and per-category / per-item rankings.
 * Rankings are stable, so entries with equal totals keep the order in which
 * they first appeared in the history.
 */
use super::models::HistoryRecord;
use std::collections::{BTreeMap, HashMap};

const TOP_CATEGORIES: usize = 5;
const TOP_ITEMS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseStats {
    pub total_purchases: u64,
    pub unique_items: usize,
    /* Distinct calendar days, in order of first appearance. */
    pub purchase_dates: Vec<String>,
    /* One decimal, or "0" when nothing was purchased. */
    pub daily_average: String,
    pub category_totals: Vec<(String, u64)>,
    pub top_categories: Vec<(String, u64)>,
    pub top_items: Vec<(String, u64)>,
    pub top_category: Option<(String, u64)>,
}

/* Sums `value` per key while remembering first-seen order. */
#[derive(Default)]
struct OrderedTally {
    index: HashMap<String, usize>,
    entries: Vec<(String, u64)>,
}

impl OrderedTally {
    fn add(&mut self, key: &str, value: u64) {
        match self.index.get(key) {
            Some(&position) => self.entries[position].1 += value,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), value));
            }
        }
    }

    fn ranked(&self) -> Vec<(String, u64)> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

impl PurchaseStats {
    pub fn from_history(history: &[HistoryRecord]) -> Self {
        let mut total_purchases = 0u64;
        let mut categories = OrderedTally::default();
        let mut items = OrderedTally::default();
        let mut purchase_dates: Vec<String> = Vec::new();

        for record in history {
            let quantity = record.effective_quantity();
            total_purchases += quantity;
            categories.add(record.display_category(), quantity);
            items.add(&record.name, quantity);
            let day = record.day();
            if !purchase_dates.contains(&day) {
                purchase_dates.push(day);
            }
        }

        let daily_average = if total_purchases > 0 && !purchase_dates.is_empty() {
            format!("{:.1}", total_purchases as f64 / purchase_dates.len() as f64)
        } else {
            "0".to_string()
        };

        let ranked_categories = categories.ranked();
        let ranked_items = items.ranked();

        PurchaseStats {
            total_purchases,
            unique_items: items.entries.len(),
            purchase_dates,
            daily_average,
            top_category: ranked_categories.first().cloned(),
            top_categories: ranked_categories.iter().take(TOP_CATEGORIES).cloned().collect(),
            top_items: ranked_items.into_iter().take(TOP_ITEMS).collect(),
            category_totals: categories.entries,
        }
    }

    pub fn has_data(&self) -> bool {
        self.total_purchases > 0
    }
}

/* Records grouped per calendar day, newest day first. */
pub fn history_by_day(history: &[HistoryRecord]) -> Vec<(String, Vec<&HistoryRecord>)> {
    let mut days: BTreeMap<String, Vec<&HistoryRecord>> = BTreeMap::new();
    for record in history {
        days.entry(record.day()).or_default().push(record);
    }
    days.into_iter().rev().collect()
}
