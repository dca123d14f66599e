// src/core/vocab.rs
use std::collections::BTreeMap;

use anyhow::Result;
use log::{debug, info, warn};

use crate::core::layout::column_index;
use crate::core::scan::{SheetGrid, WorkbookScanner};

pub const VALID_VALUES_SHEET: &str = "Gültige Werte";

/// Hard cap when walking a named range downwards.
const OPTION_SCAN_LIMIT: u32 = 200;

/// Stop reading options after this many consecutive blanks, but only
/// once enough values have been collected to trust the run is over.
const BLANK_RUN_STOP: u32 = 3;
const MIN_VALUES_BEFORE_STOP: usize = 4;

/// Resolved start of a defined-name reference like `'Listen'!$A$2:$A$200`.
#[derive(Debug, PartialEq, Eq)]
pub struct RangeAnchor {
    pub sheet: String,
    pub column: usize,
    pub row: u32,
}

/// Split a defined-name reference into sheet, column and start row.
/// Unparseable references yield None and are skipped by the caller.
pub fn parse_range_anchor(reference: &str) -> Option<RangeAnchor> {
    let (sheet_part, cell_part) = reference.split_once('!')?;
    let sheet = sheet_part
        .trim()
        .trim_start_matches('=')
        .trim_matches('\'')
        .to_string();
    if sheet.is_empty() {
        return None;
    }

    let first_cell = cell_part.split(':').next()?.replace('$', "");
    let letters: String = first_cell
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let digits: String = first_cell
        .chars()
        .skip_while(|c| c.is_ascii_alphabetic())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let column = column_index(&letters)?;
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some(RangeAnchor { sheet, column, row })
}

/// Read values down one column from an anchor, bounded by the scan cap
/// and the blank-run stop rule.
pub fn read_option_column(grid: &SheetGrid, anchor: &RangeAnchor) -> Vec<String> {
    let mut values = Vec::new();
    let mut blank_run = 0u32;

    for offset in 0..OPTION_SCAN_LIMIT {
        let row = anchor.row + offset;
        match grid.cell_text(row, anchor.column) {
            Some(text) => {
                blank_run = 0;
                values.push(text);
            }
            None => {
                blank_run += 1;
                if blank_run >= BLANK_RUN_STOP && values.len() >= MIN_VALUES_BEFORE_STOP {
                    break;
                }
            }
        }
    }
    values
}

/// Collect product category options from workbook defined names whose
/// name points at a product-type value list. The first defined name that
/// yields values wins; order of first appearance, deduplicated.
pub fn extract_category_options(scanner: &mut WorkbookScanner) -> Result<Vec<String>> {
    let candidates: Vec<(String, String)> = scanner
        .defined_names()
        .into_iter()
        .filter(|(name, _)| {
            let lower = name.to_lowercase();
            (lower.contains("product") && lower.contains("type") && lower.contains("value"))
                || lower == "feed_product_type"
        })
        .collect();

    let mut options: Vec<String> = Vec::new();
    for (name, reference) in candidates {
        let Some(anchor) = parse_range_anchor(&reference) else {
            warn!("skipping unparseable defined name '{}': {}", name, reference);
            continue;
        };
        if !scanner.has_sheet(&anchor.sheet) {
            warn!("defined name '{}' points at missing sheet '{}'", name, anchor.sheet);
            continue;
        }
        let grid = scanner.grid(&anchor.sheet)?;
        let values = read_option_column(&grid, &anchor);
        if values.is_empty() {
            continue;
        }
        for value in values {
            if !options.contains(&value) {
                options.push(value);
            }
        }
        debug!("defined name '{}' supplied the options from '{}'", name, anchor.sheet);
        break;
    }

    info!("extracted {} category options", options.len());
    Ok(options)
}

/// Pull the `[category]` token out of a classification row label.
pub fn bracketed_token(label: &str) -> Option<String> {
    let start = label.find('[')?;
    let end = label[start..].find(']')? + start;
    let token = label[start + 1..end].trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_lowercase())
    }
}

/// Read per-category classification values from the "Gültige Werte"
/// sheet: rows labeled "Produktkategorisierung ... [category]" list their
/// allowed values from the third column onward.
pub fn extract_classification_values(
    scanner: &mut WorkbookScanner,
) -> Result<BTreeMap<String, Vec<String>>> {
    if !scanner.has_sheet(VALID_VALUES_SHEET) {
        warn!("sheet '{}' not present; classification values unavailable", VALID_VALUES_SHEET);
        return Ok(BTreeMap::new());
    }
    let grid = scanner.grid(VALID_VALUES_SHEET)?;

    let mut by_category: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in 1..=grid.max_row() {
        let Some(label) = grid.cell_text(row, 1) else {
            continue;
        };
        if !label.to_lowercase().contains("produktkategorisierung") {
            continue;
        }
        let Some(category) = bracketed_token(&label) else {
            continue;
        };
        let values: Vec<String> = (2..grid.max_col())
            .filter_map(|col| grid.cell_text(row, col))
            .collect();
        if !values.is_empty() {
            by_category.entry(category).or_insert(values);
        }
    }

    info!("classification values for {} categories", by_category.len());
    Ok(by_category)
}
