// src/core/fields.rs
use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::core::layout::ColumnRef;
use crate::core::scan::SheetGrid;

/// Headers the seller templates label exactly these ways for the SKU
/// column. An exact match always wins over a positional candidate.
const SKU_EXACT_LABELS: [&str; 3] = ["sku", "seller-sku", "verkäufer-sku"];

/// Secondary product fields, located by bilingual substring match against
/// the header text. First keyword hit per field wins, scanning columns
/// left to right.
pub const AUXILIARY_FIELDS: &[(&str, &[&str])] = &[
    ("ean", &["ean", "barcode", "gtin"]),
    ("material", &["material"]),
    ("color", &["farbe", "color", "colour"]),
    ("size", &["größe", "grösse", "size"]),
    ("weight", &["gewicht", "weight"]),
    ("description", &["beschreibung", "description", "produktbeschreibung"]),
    ("manufacturer", &["hersteller", "manufacturer"]),
];

/// Columns located from the display header row. Key fields get their own
/// slot; everything else lands in `positions` under a semantic name.
#[derive(Debug, Default)]
pub struct LocatedFields {
    pub positions: BTreeMap<String, ColumnRef>,
    pub sku: Option<ColumnRef>,
    pub category: Option<ColumnRef>,
    pub brand: Option<ColumnRef>,
    pub title: Option<ColumnRef>,
}

/// Walk the header row and pin down every field we know how to fill.
pub fn locate_fields(grid: &SheetGrid, header_row: u32) -> LocatedFields {
    let mut located = LocatedFields::default();
    let header_cells = grid.populated_cells(header_row);

    for (&col, text) in &header_cells {
        let lower = text.to_lowercase();

        // SKU: any header containing "sku" except vendor codes. An exact
        // label or a position in the first two columns replaces an
        // earlier fuzzy hit further right.
        if lower.contains("sku") && !lower.contains("vendor") {
            let exact = SKU_EXACT_LABELS.contains(&lower.as_str());
            let leading = col <= 1;
            if located.sku.is_none() || exact || leading {
                located.sku = Some(ColumnRef::new(col, header_row));
                debug!("sku column: {} ('{}')", col, text);
            }
            continue;
        }

        if located.category.is_none()
            && (lower.contains("produkttyp")
                || lower.contains("product type")
                || lower.contains("kategorie")
                || lower.contains("feed_product_type")
                || lower.contains("produktkategorisierung"))
        {
            located.category = Some(ColumnRef::new(col, header_row));
            continue;
        }

        if located.brand.is_none() && (lower.contains("marke") || lower.contains("brand")) {
            located.brand = Some(ColumnRef::new(col, header_row));
            continue;
        }

        if located.title.is_none()
            && (lower.contains("produktname")
                || lower.contains("titel")
                || lower.contains("title")
                || lower.contains("item name")
                || lower.contains("artikelname"))
        {
            located.title = Some(ColumnRef::new(col, header_row));
            continue;
        }

        // Numbered slots: bullet points and search terms.
        if lower.contains("aufzählung")
            || lower.contains("aufzahlung")
            || lower.contains("bullet")
        {
            if let Some(n) = first_integer(&lower) {
                located
                    .positions
                    .entry(format!("Bullet Point {}", n))
                    .or_insert_with(|| ColumnRef::new(col, header_row));
            }
            continue;
        }
        if lower.contains("suchbegriff")
            || lower.contains("search term")
            || lower.contains("generic_keyword")
        {
            let n = first_integer(&lower).unwrap_or(1);
            located
                .positions
                .entry(format!("Search Term {}", n))
                .or_insert_with(|| ColumnRef::new(col, header_row));
            continue;
        }

        for (name, keywords) in AUXILIARY_FIELDS {
            if keywords.iter().any(|kw| lower.contains(kw)) {
                located
                    .positions
                    .entry((*name).to_string())
                    .or_insert_with(|| ColumnRef::new(col, header_row));
                break;
            }
        }
    }

    info!(
        "located fields: sku={} category={} brand={} title={} other={}",
        located.sku.is_some(),
        located.category.is_some(),
        located.brand.is_some(),
        located.title.is_some(),
        located.positions.len()
    );
    located
}

/// First run of ASCII digits in a header label, e.g. "Aufzählungspunkt 3".
pub fn first_integer(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Read the machine-readable attribute row and map internal attribute
/// names (e.g. "item_sku", "brand_name") to their columns. Without a
/// detected internal row we probe directly below the header.
pub fn map_internal_attributes(
    grid: &SheetGrid,
    internal_row: Option<u32>,
    header_row: u32,
) -> BTreeMap<String, ColumnRef> {
    let row = internal_row.unwrap_or_else(|| {
        warn!("no internal attribute row detected; probing row {}", header_row + 1);
        header_row + 1
    });

    // Identifiers keep the template's own spelling; requirement logic
    // joins on them verbatim across sheets.
    let mut mapping = BTreeMap::new();
    for (col, text) in grid.populated_cells(row) {
        mapping
            .entry(text)
            .or_insert_with(|| ColumnRef::new(col, row));
    }
    info!("mapped {} internal attributes from row {}", mapping.len(), row);
    mapping
}
