// src/core/analyzer.rs
//
// End-to-end structural analysis of an uploaded workbook: locate the
// header, classify the dialect from its labels, pin down fields and
// attributes, then fold in the auxiliary sheets. One call per upload,
// no state kept.
use std::collections::BTreeMap;

use anyhow::{bail, Result};
use log::{info, warn};

use crate::core::definitions::{map_category_requirements, parse_data_definitions};
use crate::core::detect::{classify_format, derive_row_offsets, locate_header_row, FormatSignals};
use crate::core::fields::{locate_fields, map_internal_attributes};
use crate::core::layout::{ColumnRef, LayoutDescriptor};
use crate::core::scan::WorkbookScanner;
use crate::core::vocab::{extract_category_options, extract_classification_values};

/// Infer the full structural layout of a workbook. Fails only when no
/// data sheet or no header row can be found; every auxiliary sheet
/// degrades to empty results with a warning.
pub fn analyze_workbook(scanner: &mut WorkbookScanner) -> Result<LayoutDescriptor> {
    let sheet_name = scanner.find_data_sheet()?;
    info!("analyzing data sheet '{}'", sheet_name);
    let grid = scanner.grid(&sheet_name)?;

    let Some(header_row) = locate_header_row(&grid) else {
        bail!(
            "unrecognized template: no field header row found in sheet '{}'",
            sheet_name
        );
    };

    let located = locate_fields(&grid, header_row);
    let signals = FormatSignals::collect(&grid, header_row);
    let format_kind = classify_format(
        &signals,
        located.category.as_ref().map(|c| c.column_index),
    );
    let offsets = derive_row_offsets(format_kind, header_row);

    let mut field_positions: BTreeMap<String, ColumnRef> = located.positions;
    if let Some(sku) = located.sku {
        field_positions.insert("SKU".to_string(), sku);
    }
    if let Some(category) = located.category.clone() {
        field_positions.insert("Product Type".to_string(), category);
    }
    if let Some(brand) = located.brand {
        field_positions.insert("Brand".to_string(), brand);
    }
    if let Some(title) = located.title {
        field_positions.insert("Title".to_string(), title);
    }
    if let Some(marker) = signals.offer_action {
        field_positions.insert("Offer Action".to_string(), marker);
    }
    if let Some(marker) = signals.update_delete {
        field_positions.insert("Update/Delete".to_string(), marker);
    }

    let internal_attributes =
        map_internal_attributes(&grid, offsets.internal_row, header_row);

    let example_category = offsets.example_row.and_then(|row| {
        located
            .category
            .as_ref()
            .and_then(|c| grid.cell_text(row, c.column_index))
    });

    let total_columns = grid.max_col();

    let definitions = parse_data_definitions(scanner)?;
    let required_attributes_by_category =
        map_category_requirements(scanner, &definitions.required_attributes)?;
    let category_options = extract_category_options(scanner)?;
    let classification_values_by_category = extract_classification_values(scanner)?;

    if category_options.is_empty() {
        warn!("no category options found; callers must supply categories manually");
    }

    let layout = LayoutDescriptor {
        format_kind,
        sheet_name,
        header_row,
        internal_attribute_row: offsets.internal_row,
        example_row: offsets.example_row,
        first_data_row: offsets.first_data_row,
        total_columns,
        field_positions,
        internal_attributes,
        category_options,
        example_category,
        globally_required_attributes: definitions.required_attributes,
        required_fields: definitions.required_fields,
        optional_fields: definitions.optional_fields,
        attribute_display_labels: definitions.display_labels,
        required_attributes_by_category,
        classification_values_by_category,
    };

    info!(
        "layout inferred: {:?} / header row {} / data row {} / {} fields / {} attributes",
        layout.format_kind,
        layout.header_row,
        layout.first_data_row,
        layout.field_positions.len(),
        layout.internal_attributes.len()
    );
    Ok(layout)
}
