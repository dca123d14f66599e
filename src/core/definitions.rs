// src/core/definitions.rs
use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use log::{debug, info, warn};

use crate::core::scan::{data_to_text, SheetGrid, WorkbookScanner};

pub const DEFINITIONS_SHEET: &str = "Datendefinitionen";
pub const CATEGORY_MATRIX_SHEET: &str = "AttributePTDMAP";

/// The definitions sheet carries its own header here, below a title row.
const DEFINITIONS_HEADER_ROW: u32 = 2;

/// Parsed field definitions: which attributes the template declares as
/// required or optional, plus display labels for reporting.
#[derive(Debug, Default)]
pub struct DataDefinitions {
    /// Localized labels of required fields, sheet order.
    pub required_fields: Vec<String>,
    /// Localized labels of optional fields, sheet order.
    pub optional_fields: Vec<String>,
    /// Internal attribute ids declared required.
    pub required_attributes: BTreeSet<String>,
    /// attribute id -> localized display label.
    pub display_labels: BTreeMap<String, String>,
}

/// Parse the "Datendefinitionen" sheet. Absence of the sheet or of its
/// expected columns yields empty results with a warning, never an error.
pub fn parse_data_definitions(scanner: &mut WorkbookScanner) -> Result<DataDefinitions> {
    if !scanner.has_sheet(DEFINITIONS_SHEET) {
        warn!("sheet '{}' not present; field requirements unavailable", DEFINITIONS_SHEET);
        return Ok(DataDefinitions::default());
    }
    let grid = scanner.grid(DEFINITIONS_SHEET)?;
    Ok(parse_definitions_grid(&grid))
}

fn parse_definitions_grid(grid: &SheetGrid) -> DataDefinitions {
    let mut required_col = None;
    let mut label_col = None;
    let mut attribute_col = None;
    for (col, text) in grid.populated_cells(DEFINITIONS_HEADER_ROW) {
        let lower = text.to_lowercase();
        if lower.contains("pflichtfeld") && required_col.is_none() {
            required_col = Some(col);
        } else if lower.contains("lokale") && label_col.is_none() {
            label_col = Some(col);
        } else if lower.contains("feldname") && attribute_col.is_none() {
            attribute_col = Some(col);
        }
    }

    let (Some(required_col), Some(label_col)) = (required_col, label_col) else {
        warn!(
            "sheet '{}' lacks the expected header columns; ignoring it",
            DEFINITIONS_SHEET
        );
        return DataDefinitions::default();
    };

    let mut defs = DataDefinitions::default();
    for row in (DEFINITIONS_HEADER_ROW + 1)..=grid.max_row() {
        let label = grid.cell_text(row, label_col);
        let attribute = attribute_col.and_then(|col| grid.cell_text(row, col));
        let flag = grid
            .cell_text(row, required_col)
            .unwrap_or_default()
            .to_lowercase();

        if let (Some(attr), Some(label)) = (&attribute, &label) {
            defs.display_labels.insert(attr.clone(), label.clone());
        }

        // The attribute id is recorded as required on its own; the label
        // lists are a reporting surface and tolerate a blank label cell.
        if flag.contains("pflicht") || flag.contains("erforder") {
            if let Some(attr) = attribute {
                defs.required_attributes.insert(attr);
            }
            if let Some(label) = label {
                defs.required_fields.push(label);
            }
        } else if flag.contains("optional") {
            if let Some(label) = label {
                defs.optional_fields.push(label);
            }
        }
    }

    info!(
        "definitions: {} required, {} optional, {} labels",
        defs.required_fields.len(),
        defs.optional_fields.len(),
        defs.display_labels.len()
    );
    defs
}

/// A matrix cell marks an attribute applicable unless it is blank, zero,
/// or an explicit negative.
pub fn cell_is_applicable(grid: &SheetGrid, row: u32, col: usize) -> bool {
    use calamine::Data;
    match grid.cell_value(row, col) {
        None | Some(Data::Empty) => false,
        Some(Data::Float(f)) => *f != 0.0,
        Some(Data::Int(i)) => *i != 0,
        Some(Data::Bool(b)) => *b,
        Some(other) => {
            let text = data_to_text(other).trim().to_lowercase();
            !matches!(text.as_str(), "" | "0" | "no" | "false" | "nein")
        }
    }
}

/// Refine the globally-required attribute set per category from the
/// "AttributePTDMAP" matrix: row 1 holds category names from the second
/// column, the first column holds attribute ids. Only attributes already
/// known to be required are considered.
pub fn map_category_requirements(
    scanner: &mut WorkbookScanner,
    required_attributes: &BTreeSet<String>,
) -> Result<BTreeMap<String, Vec<String>>> {
    if !scanner.has_sheet(CATEGORY_MATRIX_SHEET) {
        warn!(
            "sheet '{}' not present; per-category requirements unavailable",
            CATEGORY_MATRIX_SHEET
        );
        return Ok(BTreeMap::new());
    }
    if required_attributes.is_empty() {
        debug!("no globally required attributes; skipping category matrix");
        return Ok(BTreeMap::new());
    }
    let grid = scanner.grid(CATEGORY_MATRIX_SHEET)?;

    let mut categories: Vec<(usize, String)> = Vec::new();
    for (col, text) in grid.populated_cells(1) {
        if col >= 1 {
            categories.push((col, text.to_lowercase()));
        }
    }

    let mut by_category: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in 2..=grid.max_row() {
        let Some(attribute) = grid.cell_text(row, 0) else {
            continue;
        };
        if !required_attributes.contains(&attribute) {
            continue;
        }
        for (col, category) in &categories {
            if cell_is_applicable(&grid, row, *col) {
                by_category
                    .entry(category.clone())
                    .or_default()
                    .push(attribute.clone());
            }
        }
    }

    info!("category matrix covers {} categories", by_category.len());
    Ok(by_category)
}
