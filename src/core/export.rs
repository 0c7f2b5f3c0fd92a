/*
 * One-way CSV exports of the grocery data. `encode` turns any sequence of
 * rows into a document given its columns: a header line with the
 * bare column names, then one line per row where every cell is coerced to
 * text and wrapped in double quotes. Embedded quotes are not escaped since
 * the files are meant for spreadsheets and are never re-imported.
 *
 * The five concrete exports (active list, full history, one day of history,
 * frequency table and statistics summary) differ only in their columns and
 * row source. Each is returned as an `ExportDocument` carrying the default
 * file name; `write_export` saves it to disk.
 */
use super::models::{
    FrequencyCounters, HistoryRecord, Item, MAX_NAME_CHARS, MAX_NOTES_CHARS, Timestamp,
    display_date, display_time, iso_day,
};
use super::statistics::PurchaseStats;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const CSV_SEPARATOR: &str = ",";
const LINE_SEPARATOR: &str = "\n";
const ELLIPSIS: &str = "...";

pub const STATUS_PURCHASED: &str = "Acheté";
pub const STATUS_TO_BUY: &str = "À acheter";

/* A column: its header and how to extract the cell text from a row. */
pub struct Column<'a, R> {
    pub header: &'a str,
    pub extract: fn(&R) -> String,
}

impl<'a, R> Column<'a, R> {
    pub const fn new(header: &'a str, extract: fn(&R) -> String) -> Self {
        Column { header, extract }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub file_name: String,
    pub content: String,
}

/*
 * Encodes rows as CSV text. The first line joins the column headers with
 * commas, unquoted. Each following line holds one row, every cell produced
 * by the column's extractor and wrapped in double quotes. Lines are joined
 * with `\n` and there is no trailing newline.
 *
 * Args:
 *   rows: The rows to encode, in output order. May be empty.
 *   columns: The columns, in output order.
 *
 * Returns:
 *   The CSV document. With no rows it is the header line alone.
 */
pub fn encode<'r, R: 'r, I>(rows: I, columns: &[Column<'_, R>]) -> String
where
    I: IntoIterator<Item = &'r R>,
{
    let header = columns
        .iter()
        .map(|column| column.header)
        .collect::<Vec<_>>()
        .join(CSV_SEPARATOR);

    let mut lines = vec![header];
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| format!("\"{}\"", (column.extract)(row)))
            .collect();
        lines.push(cells.join(CSV_SEPARATOR));
    }
    lines.join(LINE_SEPARATOR)
}

/* Shortens display text, marking the cut with "...". */
pub fn truncate_for_display(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}{ELLIPSIS}")
}

fn item_status(item: &Item) -> String {
    if item.checked {
        STATUS_PURCHASED.to_string()
    } else {
        STATUS_TO_BUY.to_string()
    }
}

const ACTIVE_LIST_COLUMNS: [Column<'static, Item>; 6] = [
    Column::new("Article", |item| item.name.clone()),
    Column::new("Catégorie", |item| item.display_category().to_string()),
    Column::new("Quantité", |item| item.quantity.to_string()),
    Column::new("Notes", |item| item.notes.clone()),
    Column::new("Statut", item_status),
    Column::new("Date", |item| display_date(item.added_at)),
];

const FULL_HISTORY_COLUMNS: [Column<'static, HistoryRecord>; 6] = [
    Column::new("Article", |r| truncate_for_display(&r.name, MAX_NAME_CHARS)),
    Column::new("Catégorie", |r| r.display_category().to_string()),
    Column::new("Quantité", |r| r.quantity.to_string()),
    Column::new("Notes", |r| truncate_for_display(&r.notes, MAX_NOTES_CHARS)),
    Column::new("Date Achat", |r| display_date(r.purchased_at)),
    Column::new("Heure Achat", |r| display_time(r.purchased_at)),
];

const DAY_HISTORY_COLUMNS: [Column<'static, HistoryRecord>; 5] = [
    Column::new("Article", |r| truncate_for_display(&r.name, MAX_NAME_CHARS)),
    Column::new("Catégorie", |r| r.display_category().to_string()),
    Column::new("Quantité", |r| r.quantity.to_string()),
    Column::new("Notes", |r| truncate_for_display(&r.notes, MAX_NOTES_CHARS)),
    Column::new("Heure Achat", |r| display_time(r.purchased_at)),
];

const FREQUENCY_COLUMNS: [Column<'static, (String, u64)>; 2] = [
    Column::new("Article", |(name, _)| truncate_for_display(name, MAX_NAME_CHARS)),
    Column::new("Nombre d'achats", |(_, count)| count.to_string()),
];

const STATS_COLUMNS: [Column<'static, (String, String)>; 2] = [
    Column::new("Statistique", |(label, _)| label.clone()),
    Column::new("Valeur", |(_, value)| value.clone()),
];

pub fn export_active_list(items: &[Item], now: Timestamp) -> ExportDocument {
    ExportDocument {
        file_name: format!("liste_courses_{}.csv", iso_day(now)),
        content: encode(items, &ACTIVE_LIST_COLUMNS),
    }
}

pub fn export_full_history(history: &[HistoryRecord], now: Timestamp) -> ExportDocument {
    ExportDocument {
        file_name: format!("historique_complet_{}.csv", iso_day(now)),
        content: encode(history, &FULL_HISTORY_COLUMNS),
    }
}

/* `day` is an ISO calendar day (`YYYY-MM-DD`). */
pub fn export_day_history(history: &[HistoryRecord], day: &str) -> ExportDocument {
    let rows = history.iter().filter(|record| record.is_on_day(day));
    ExportDocument {
        file_name: format!("historique_{day}.csv"),
        content: encode(rows, &DAY_HISTORY_COLUMNS),
    }
}

pub fn export_frequency(counters: &FrequencyCounters, now: Timestamp) -> ExportDocument {
    let rows: Vec<(String, u64)> = counters
        .ranked()
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    ExportDocument {
        file_name: format!("top_achats_{}.csv", iso_day(now)),
        content: encode(&rows, &FREQUENCY_COLUMNS),
    }
}

/* Five fixed summary rows rather than one row per record. */
pub fn stats_rows(stats: &PurchaseStats) -> Vec<(String, String)> {
    let favourite = match &stats.top_category {
        Some((category, count)) => format!("{category} ({count} achats)"),
        None => "N/A (0 achats)".to_string(),
    };
    vec![
        (
            "Total Articles Achetés".to_string(),
            stats.total_purchases.to_string(),
        ),
        (
            "Articles Uniques".to_string(),
            stats.unique_items.to_string(),
        ),
        (
            "Jours d'Achat".to_string(),
            stats.purchase_dates.len().to_string(),
        ),
        ("Moyenne par Jour".to_string(), stats.daily_average.clone()),
        ("Catégorie Favorite".to_string(), favourite),
    ]
}

pub fn export_stats(stats: &PurchaseStats, now: Timestamp) -> ExportDocument {
    let rows = stats_rows(stats);
    ExportDocument {
        file_name: format!("statistiques_{}.csv", iso_day(now)),
        content: encode(&rows, &STATS_COLUMNS),
    }
}

/*
 * Writes `document` as UTF-8 into `directory`, creating the directory if
 * needed. Returns the full path of the written file.
 */
pub fn write_export(directory: &Path, document: &ExportDocument) -> io::Result<PathBuf> {
    if !directory.exists() {
        fs::create_dir_all(directory)?;
    }
    let path = directory.join(&document.file_name);
    fs::write(&path, document.content.as_bytes())?;
    log::info!(
        "Export: Wrote {} bytes to {path:?}.",
        document.content.len()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // 2024-03-15T14:30:05.123Z
    const NOW: i64 = 1_710_513_005_123;
    const DAY_MS: i64 = 86_400_000;

    fn history_record(name: &str, quantity: u32, at: i64) -> HistoryRecord {
        let mut item = Item::new(1, name, quantity, 0);
        item.category = "Boissons".to_string();
        HistoryRecord::from_item(&item, at)
    }

    #[test]
    fn test_encode_empty_rows_is_header_only() {
        let content = encode(&Vec::<Item>::new(), &ACTIVE_LIST_COLUMNS);
        assert_eq!(content, "Article,Catégorie,Quantité,Notes,Statut,Date");
    }

    #[test]
    fn test_encode_quotes_cells_without_escaping() {
        let mut item = Item::new(1, "Tea \"green\"", 3, NOW);
        item.notes = "loose, leaf".to_string();
        item.category.clear();
        item.checked = true;

        let content = encode(&[item], &ACTIVE_LIST_COLUMNS);

        let lines: Vec<&str> = content.split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "\"Tea \"green\"\",\"Autres\",\"3\",\"loose, leaf\",\"Acheté\",\"15/03/2024\""
        );
    }

    #[test]
    fn test_active_list_export_file_name_and_status() {
        let items = vec![Item::new(1, "Bread", 1, NOW)];
        let document = export_active_list(&items, NOW);
        assert_eq!(document.file_name, "liste_courses_2024-03-15.csv");
        assert!(document.content.ends_with("\"À acheter\",\"15/03/2024\""));
    }

    #[test]
    fn test_full_history_export_columns() {
        let history = vec![history_record("Juice", 2, NOW)];
        let document = export_full_history(&history, NOW);
        assert_eq!(document.file_name, "historique_complet_2024-03-15.csv");
        assert_eq!(
            document.content,
            "Article,Catégorie,Quantité,Notes,Date Achat,Heure Achat\n\
             \"Juice\",\"Boissons\",\"2\",\"\",\"15/03/2024\",\"14:30:05\""
        );
    }

    #[test]
    fn test_history_export_truncates_with_ellipsis() {
        let mut record = history_record("short", 1, NOW);
        record.name = "a".repeat(70);
        let document = export_full_history(&[record], NOW);
        let expected_name = format!("\"{}...\"", "a".repeat(60));
        assert!(document.content.contains(&expected_name));
    }

    #[test]
    fn test_day_history_export_filters_by_day() {
        let history = vec![
            history_record("Milk", 1, NOW),
            history_record("Bread", 1, NOW + DAY_MS),
            history_record("Tea", 4, NOW + 60_000),
        ];
        let document = export_day_history(&history, "2024-03-15");
        assert_eq!(document.file_name, "historique_2024-03-15.csv");
        assert_eq!(
            document.content,
            "Article,Catégorie,Quantité,Notes,Heure Achat\n\
             \"Milk\",\"Boissons\",\"1\",\"\",\"14:30:05\"\n\
             \"Tea\",\"Boissons\",\"4\",\"\",\"14:31:05\""
        );
    }

    #[test]
    fn test_frequency_export_sorted_by_count() {
        let counters: FrequencyCounters = vec![
            ("Bread".to_string(), 2),
            ("Milk".to_string(), 9),
        ]
        .into_iter()
        .collect();
        let document = export_frequency(&counters, NOW);
        assert_eq!(document.file_name, "top_achats_2024-03-15.csv");
        assert_eq!(
            document.content,
            "Article,Nombre d'achats\n\"Milk\",\"9\"\n\"Bread\",\"2\""
        );
    }

    #[test]
    fn test_stats_export_has_five_rows() {
        let history = vec![history_record("Milk", 2, NOW), history_record("Tea", 1, NOW)];
        let stats = PurchaseStats::from_history(&history);
        let document = export_stats(&stats, NOW);
        assert_eq!(document.file_name, "statistiques_2024-03-15.csv");
        assert_eq!(
            document.content,
            "Statistique,Valeur\n\
             \"Total Articles Achetés\",\"3\"\n\
             \"Articles Uniques\",\"2\"\n\
             \"Jours d'Achat\",\"1\"\n\
             \"Moyenne par Jour\",\"3.0\"\n\
             \"Catégorie Favorite\",\"Boissons (3 achats)\""
        );
    }

    #[test]
    fn test_stats_rows_without_history() {
        let rows = stats_rows(&PurchaseStats::from_history(&[]));
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[3].1, "0");
        assert_eq!(rows[4].1, "N/A (0 achats)");
    }

    #[test]
    fn test_write_export_creates_file() -> io::Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("exports");
        let document = ExportDocument {
            file_name: "liste.csv".to_string(),
            content: "Article\n\"Café\"".to_string(),
        };
        let path = write_export(&target, &document)?;
        assert_eq!(path, target.join("liste.csv"));
        assert_eq!(fs::read_to_string(path)?, "Article\n\"Café\"");
        Ok(())
    }
}
