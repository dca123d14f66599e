// src/core/detect.rs
use log::{debug, info, warn};

use crate::core::layout::{ColumnRef, FormatKind};
use crate::core::scan::SheetGrid;

/// Rows probed for the field header, most likely first. Seller templates
/// put the display header on row 2 (flat-file) or row 4 (XML).
pub const HEADER_PROBE_ROWS: [u32; 5] = [2, 4, 1, 3, 5];

/// A row qualifies as a header only with strictly more populated cells
/// than this. Thin administrative rows above the header stay below it.
pub const MIN_HEADER_CELLS: usize = 5;

/// Find the field header row by probing the candidate rows in order and
/// keeping the first sufficiently dense one.
pub fn locate_header_row(grid: &SheetGrid) -> Option<u32> {
    for row in HEADER_PROBE_ROWS {
        let populated = grid.populated_cells(row).len();
        debug!("header probe row {}: {} populated cells", row, populated);
        if populated > MIN_HEADER_CELLS {
            info!("header row located at row {}", row);
            return Some(row);
        }
    }
    None
}

/// Dialect marker columns found among the header labels, with the cell
/// where each marker first appeared.
#[derive(Debug, Default)]
pub struct FormatSignals {
    /// "Angebotsaktion" column, present in XML-processed templates.
    pub offer_action: Option<ColumnRef>,
    /// Combined "Update/Delete" column, present in flat-file templates.
    pub update_delete: Option<ColumnRef>,
}

impl FormatSignals {
    /// Scan the header row's labels for dialect marker columns.
    pub fn collect(grid: &SheetGrid, header_row: u32) -> Self {
        let mut signals = Self::default();
        for (&col, text) in &grid.populated_cells(header_row) {
            let lower = text.to_lowercase();
            let offer_action =
                lower.contains("angebotsaktion") || (lower.contains("offer") && lower.contains("action"));
            if offer_action && signals.offer_action.is_none() {
                signals.offer_action = Some(ColumnRef::new(col, header_row));
            }
            if lower.contains("update")
                && lower.contains("delete")
                && signals.update_delete.is_none()
            {
                signals.update_delete = Some(ColumnRef::new(col, header_row));
            }
        }
        signals
    }
}

/// Decide the template dialect. Marker columns win, an update/delete
/// column taking precedence over an offer-action one; without markers, a
/// category field sitting in the very first column indicates the
/// flat-file layout, anything else the XML layout.
pub fn classify_format(signals: &FormatSignals, category_col: Option<usize>) -> FormatKind {
    if signals.update_delete.is_some() {
        if signals.offer_action.is_some() {
            warn!("both dialect markers present; treating template as flat-file");
        }
        info!("format classified as flat-file (Update/Delete marker)");
        return FormatKind::FlatFile;
    }
    if signals.offer_action.is_some() {
        info!("format classified as XML (offer action marker)");
        return FormatKind::Xml;
    }
    match category_col {
        Some(0) => {
            info!("format classified as flat-file (category in first column)");
            FormatKind::FlatFile
        }
        _ => {
            info!("format classified as XML (fallback)");
            FormatKind::Xml
        }
    }
}

/// Rows derived from the header position: where the machine-readable
/// attribute names, the example row, and the first writable data row sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowOffsets {
    pub internal_row: Option<u32>,
    pub example_row: Option<u32>,
    pub first_data_row: u32,
}

/// XML templates at the canonical header position carry an internal
/// attribute row and an example row between header and data. Flat-file
/// templates at their canonical position carry only the internal row.
/// Off-canonical headers get data directly below, nothing in between.
pub fn derive_row_offsets(format: FormatKind, header_row: u32) -> RowOffsets {
    match format {
        FormatKind::Xml if header_row == 4 => RowOffsets {
            internal_row: Some(header_row + 1),
            example_row: Some(header_row + 2),
            first_data_row: header_row + 3,
        },
        FormatKind::FlatFile if header_row == 2 => RowOffsets {
            internal_row: Some(header_row + 1),
            example_row: None,
            first_data_row: header_row + 2,
        },
        _ => {
            warn!(
                "header at non-canonical row {}; assuming data starts directly below",
                header_row
            );
            RowOffsets {
                internal_row: None,
                example_row: None,
                first_data_row: header_row + 1,
            }
        }
    }
}
