//! Locates the bulletin table and walks its rows.
//!
//! The page carries several layout tables. The bulletin is the one whose rows
//! have six cells (datetime, latitude, longitude, depth, magnitude, location),
//! so it is found by shape rather than by position on the page.

use crate::types::RawRow;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

pub const BULLETIN_COLUMNS: usize = 6;

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("valid selector"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));

fn is_element(node: &scraper::Node, name: &str) -> bool {
    node.as_element().map_or(false, |e| e.name() == name)
}

/// Rows belonging to `table` itself, not to tables nested inside it.
fn own_rows<'a>(table: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    let table_id = table.id();
    table.select(&ROW).filter(move |row| {
        row.ancestors()
            .find(|n| is_element(n.value(), "table"))
            .map(|n| n.id())
            == Some(table_id)
    })
}

/// Direct `td` children of a row.
fn data_cells<'a>(row: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| cell.value().name() == "td")
        .collect()
}

/// Cell text with runs of whitespace (including `&nbsp;`) collapsed.
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Picks the table with the most six-cell rows.
pub fn locate_bulletin_table(document: &Html) -> Option<ElementRef<'_>> {
    let mut best: Option<(usize, ElementRef<'_>)> = None;
    for (index, table) in document.select(&TABLE).enumerate() {
        let matching = own_rows(table)
            .filter(|row| data_cells(*row).len() == BULLETIN_COLUMNS)
            .count();
        debug!(table_index = index, six_cell_rows = matching, "Scanned table");
        if matching > 0 && best.map_or(true, |(count, _)| matching > count) {
            best = Some((matching, table));
        }
    }
    best.map(|(_, table)| table)
}

/// Lazy walk over the bulletin rows.
///
/// Rows without any `td` (header and spacer rows) are ignored. Rows with the
/// wrong cell count, or with a blank datetime, latitude, longitude or
/// magnitude, are dropped and counted in [`BulletinRows::skipped`].
pub struct BulletinRows<'a> {
    rows: Box<dyn Iterator<Item = ElementRef<'a>> + 'a>,
    seen: usize,
    skipped: usize,
}

impl<'a> BulletinRows<'a> {
    /// Data rows encountered so far, including skipped ones.
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Rows dropped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<'a> Iterator for BulletinRows<'a> {
    type Item = RawRow;

    fn next(&mut self) -> Option<RawRow> {
        for row in self.rows.by_ref() {
            let cells = data_cells(row);
            if cells.is_empty() {
                continue;
            }
            self.seen += 1;
            if cells.len() != BULLETIN_COLUMNS {
                debug!(cells = cells.len(), "Skipping row with unexpected cell count");
                self.skipped += 1;
                continue;
            }
            let mut texts = cells.into_iter().map(cell_text);
            let raw = RawRow {
                datetime: texts.next().unwrap_or_default(),
                latitude: texts.next().unwrap_or_default(),
                longitude: texts.next().unwrap_or_default(),
                depth: texts.next().unwrap_or_default(),
                magnitude: texts.next().unwrap_or_default(),
                location: texts.next().unwrap_or_default(),
            };
            let required = [&raw.datetime, &raw.latitude, &raw.longitude, &raw.magnitude];
            if required.iter().any(|t| t.is_empty()) {
                debug!(?raw, "Skipping row with blank required cell");
                self.skipped += 1;
                continue;
            }
            return Some(raw);
        }
        None
    }
}

/// Starts a walk over the bulletin table of `document`.
pub fn extract_rows(document: &Html) -> BulletinRows<'_> {
    let rows: Box<dyn Iterator<Item = ElementRef<'_>> + '_> = match locate_bulletin_table(document) {
        Some(table) => Box::new(own_rows(table)),
        None => {
            warn!("No six-column table found - the bulletin page structure may have changed");
            Box::new(std::iter::empty())
        }
    };
    BulletinRows {
        rows,
        seen: 0,
        skipped: 0,
    }
}
