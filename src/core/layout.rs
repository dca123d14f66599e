// src/core/layout.rs
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// The two recognized template dialects.
///
/// XML templates carry an "Angebotsaktion" (offer action) column and an
/// example row between the machine attribute row and real data. Flat file
/// templates carry a combined update/delete column and no example row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FormatKind {
    Xml,
    FlatFile,
}

/// Position of one detected column: spreadsheet letter, zero-based index
/// and the 1-based row the detection happened on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    pub column: String,
    pub column_index: usize,
    pub row: u32,
}

impl ColumnRef {
    pub fn new(column_index: usize, row: u32) -> Self {
        Self {
            column: column_letter(column_index),
            column_index,
            row,
        }
    }
}

/// Convert a zero-based column index to its spreadsheet letter ("A", "Z", "AA", ...).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Convert a spreadsheet column letter back to its zero-based index.
pub fn column_index(letters: &str) -> Option<usize> {
    let mut n = 0usize;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        n = n * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    if n == 0 {
        None
    } else {
        Some(n - 1)
    }
}

/// Split an A1-style cell reference ("BC12") into (1-based row, zero-based column).
pub fn split_cell_ref(cell_ref: &str) -> Option<(u32, usize)> {
    let digits_at = cell_ref.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell_ref.split_at(digits_at);
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row, column_index(letters)?))
}

/// The inferred structural map of one uploaded workbook.
///
/// Built once per analysis, held in memory for the session, consumed
/// read-only by the row filler. Never persisted.
///
/// `field_positions` and `internal_attributes` are two separate key spaces
/// over the same underlying columns: human-facing semantic names ("SKU",
/// "Bullet Point 3") drive content filling, machine attribute identifiers
/// ("item_sku") drive required-field logic. They must not be conflated.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutDescriptor {
    pub format_kind: FormatKind,
    pub sheet_name: String,
    pub header_row: u32,
    pub internal_attribute_row: Option<u32>,
    pub example_row: Option<u32>,
    pub first_data_row: u32,
    pub total_columns: usize,

    pub field_positions: BTreeMap<String, ColumnRef>,
    pub internal_attributes: BTreeMap<String, ColumnRef>,

    /// Valid category values in first-seen order, duplicates removed.
    pub category_options: Vec<String>,
    /// Value of the category column on the example row, when one exists.
    pub example_category: Option<String>,

    pub globally_required_attributes: BTreeSet<String>,
    /// Human display labels of required / optional fields, for reporting.
    pub required_fields: Vec<String>,
    pub optional_fields: Vec<String>,
    /// Internal attribute identifier -> human label, reporting only.
    pub attribute_display_labels: BTreeMap<String, String>,

    /// Lower-cased category -> attributes required for that category, in
    /// matrix row order. Always a subset of `globally_required_attributes`.
    pub required_attributes_by_category: BTreeMap<String, Vec<String>>,
    /// Lower-cased category -> valid classification node values.
    pub classification_values_by_category: BTreeMap<String, Vec<String>>,
}

impl LayoutDescriptor {
    /// Bullet point columns sorted by slot number.
    pub fn bullet_columns(&self) -> Vec<&ColumnRef> {
        self.numbered_columns("Bullet Point ")
    }

    /// Search term columns sorted by slot number.
    pub fn search_term_columns(&self) -> Vec<&ColumnRef> {
        self.numbered_columns("Search Term ")
    }

    fn numbered_columns(&self, prefix: &str) -> Vec<&ColumnRef> {
        let mut slots: Vec<(u32, &ColumnRef)> = self
            .field_positions
            .iter()
            .filter_map(|(key, col)| {
                let n: u32 = key.strip_prefix(prefix)?.parse().ok()?;
                Some((n, col))
            })
            .collect();
        slots.sort_by_key(|(n, _)| *n);
        slots.into_iter().map(|(_, col)| col).collect()
    }

    /// Human label for an attribute identifier, falling back to the
    /// identifier itself.
    pub fn display_label<'a>(&'a self, attribute: &'a str) -> &'a str {
        self.attribute_display_labels
            .get(attribute)
            .map(String::as_str)
            .unwrap_or(attribute)
    }

    /// Display labels of the attributes required for one category.
    pub fn required_display_labels(&self, category: &str) -> Vec<String> {
        self.required_attributes_by_category
            .get(&category.trim().to_lowercase())
            .map(|attrs| {
                attrs
                    .iter()
                    .map(|a| self.display_label(a).to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}
