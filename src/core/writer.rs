// src/core/writer.rs
//
// Writes product rows into an analyzed workbook without disturbing
// anything else in the archive. Every untouched zip entry (macro
// payload, styles, other sheets, named ranges) is raw-copied byte for
// byte; only the data sheet's XML part is rewritten, and within it only
// the addressed cells change.
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::layout::{column_letter, split_cell_ref, LayoutDescriptor};
use crate::{GeneratedContent, CONTENT_SLOTS};

/// Externally supplied product data: ordered label -> value pairs, as
/// they came out of the seller's source sheet.
pub type SourceRow = Vec<(String, String)>;

/// Result of one fill run: the rewritten workbook plus per-row advisories.
pub struct FillOutcome {
    pub bytes: Vec<u8>,
    pub diagnostics: Vec<RowDiagnostic>,
}

/// Advisory gaps noticed while filling one row. Never blocks output.
#[derive(Debug, Clone)]
pub struct RowDiagnostic {
    pub target_row: u32,
    pub category: Option<String>,
    /// Display labels of required attributes left blank on this row.
    pub missing_required: Vec<String>,
}

/// Source-row keyword lookup per internal attribute family. The first
/// matching attribute substring decides which source labels to try.
const SOURCE_SYNONYMS: &[(&str, &[&str])] = &[
    ("sku", &["sku", "artikelnummer"]),
    ("external_product_id", &["ean", "gtin", "barcode"]),
    ("ean", &["ean", "gtin", "barcode"]),
    ("brand", &["marke", "brand"]),
    ("manufacturer", &["hersteller", "manufacturer"]),
    ("color", &["farbe", "color", "colour"]),
    ("size", &["größe", "grösse", "size"]),
    ("material", &["material"]),
    ("weight", &["gewicht", "weight"]),
];

/// Source labels that identify a product's category.
const CATEGORY_SOURCE_KEYS: &[&str] = &["produkttyp", "product type", "kategorie", "category"];

/// Fill one product per data row, starting at the layout's first data
/// row. Returns the complete workbook bytes with only those rows touched.
pub fn fill_products(
    template: &[u8],
    layout: &LayoutDescriptor,
    products: &[(SourceRow, GeneratedContent)],
) -> Result<FillOutcome> {
    let mut edits: BTreeMap<u32, BTreeMap<usize, String>> = BTreeMap::new();
    let mut diagnostics = Vec::with_capacity(products.len());

    for (index, (source, content)) in products.iter().enumerate() {
        let target_row = layout.first_data_row + index as u32;
        let row_edits = edits.entry(target_row).or_default();
        let category = plan_row(layout, source, content, row_edits);

        let missing_required = category
            .as_deref()
            .map(|cat| missing_required_labels(layout, cat, row_edits))
            .unwrap_or_default();
        if !missing_required.is_empty() {
            warn!(
                "row {}: {} required fields left blank",
                target_row,
                missing_required.len()
            );
        }
        diagnostics.push(RowDiagnostic {
            target_row,
            category,
            missing_required,
        });
    }

    let part_path = sheet_part_path(template, &layout.sheet_name)?;
    let bytes = apply_cell_edits(template, &part_path, &edits)?;
    info!(
        "filled {} product rows into '{}' ({})",
        products.len(),
        layout.sheet_name,
        part_path
    );
    Ok(FillOutcome { bytes, diagnostics })
}

/// Decide every cell value for one product row. Returns the resolved
/// category, used for the required-field advisory.
fn plan_row(
    layout: &LayoutDescriptor,
    source: &SourceRow,
    content: &GeneratedContent,
    row_edits: &mut BTreeMap<usize, String>,
) -> Option<String> {
    let category = source_lookup(source, CATEGORY_SOURCE_KEYS)
        .map(str::to_string)
        .or_else(|| layout.example_category.clone());

    // Generated content goes to the semantic columns first.
    if let Some(col) = layout.field_positions.get("Title") {
        set_if_value(row_edits, col.column_index, Some(content.title.clone()));
    }
    for (bullet, col) in content
        .bullet_points
        .iter()
        .take(CONTENT_SLOTS)
        .zip(layout.bullet_columns())
    {
        set_if_value(row_edits, col.column_index, Some(bullet.clone()));
    }
    let term_columns = layout.search_term_columns();
    if term_columns.len() <= 1 {
        if let Some(col) = term_columns.first() {
            set_if_value(row_edits, col.column_index, Some(content.search_terms.clone()));
        }
    } else {
        let terms = content
            .search_terms
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .take(CONTENT_SLOTS);
        for (term, col) in terms.zip(term_columns) {
            set_if_value(row_edits, col.column_index, Some(term.to_string()));
        }
    }

    // Source data into the remaining semantic columns.
    if let Some(col) = layout.field_positions.get("SKU") {
        let sku = source_lookup(source, &["sku", "artikelnummer"]);
        set_if_value(row_edits, col.column_index, sku.map(str::to_string));
    }
    if let Some(col) = layout.field_positions.get("Product Type") {
        set_if_value(row_edits, col.column_index, category.clone());
    }
    if let Some(col) = layout.field_positions.get("Brand") {
        let brand = source_lookup(source, &["marke", "brand"]);
        set_if_value(row_edits, col.column_index, brand.map(str::to_string));
    }
    for (field, keywords) in crate::core::fields::AUXILIARY_FIELDS {
        if *field == "description" {
            continue;
        }
        if let Some(col) = layout.field_positions.get(*field) {
            let value = source_lookup(source, keywords);
            set_if_value(row_edits, col.column_index, value.map(str::to_string));
        }
    }
    if let Some(col) = layout.field_positions.get("description") {
        let value = content
            .description
            .clone()
            .or_else(|| source_lookup(source, &["beschreibung", "description"]).map(str::to_string));
        set_if_value(row_edits, col.column_index, value);
    }

    // Internal attributes fill whatever columns are still untouched.
    for (attribute, col) in &layout.internal_attributes {
        if row_edits.contains_key(&col.column_index) {
            continue;
        }
        let value = resolve_attribute_value(attribute, source, content, category.as_deref());
        set_if_value(row_edits, col.column_index, value);
    }

    category
}

fn set_if_value(row_edits: &mut BTreeMap<usize, String>, col: usize, value: Option<String>) {
    if let Some(value) = value {
        if !value.trim().is_empty() {
            row_edits.insert(col, value);
        }
    }
}

/// First source value whose label contains any of the keywords.
pub fn source_lookup<'a>(source: &'a SourceRow, keywords: &[&str]) -> Option<&'a str> {
    source
        .iter()
        .find(|(label, value)| {
            let lower = label.to_lowercase();
            !value.trim().is_empty() && keywords.iter().any(|kw| lower.contains(kw))
        })
        .map(|(_, value)| value.as_str())
}

/// Value for one internal attribute: generated content first, then the
/// source row by synonym, then a semantic default, else nothing.
/// Identifier matching is case-insensitive; the id itself keeps the
/// template's spelling.
pub fn resolve_attribute_value(
    attribute: &str,
    source: &SourceRow,
    content: &GeneratedContent,
    category: Option<&str>,
) -> Option<String> {
    let attribute = attribute.to_lowercase();
    let attribute = attribute.as_str();
    if attribute.contains("item_name") || attribute == "title" {
        return Some(content.title.clone());
    }
    if attribute.contains("bullet_point") {
        let slot = crate::core::fields::first_integer(attribute)? as usize;
        return content.bullet_points.get(slot.checked_sub(1)?).cloned();
    }
    if attribute.contains("generic_keyword") || attribute.contains("search_term") {
        return Some(content.search_terms.clone());
    }
    if attribute.contains("product_description") || attribute == "description" {
        return content.description.clone();
    }
    if attribute.contains("product_type") || attribute.contains("category") {
        return category.map(str::to_string);
    }

    for (family, keywords) in SOURCE_SYNONYMS {
        if attribute.contains(family) {
            if let Some(value) = source_lookup(source, keywords) {
                return Some(value.to_string());
            }
            break;
        }
    }

    attribute_default(attribute)
}

/// Safe defaults for attributes sellers rarely provide.
pub fn attribute_default(attribute: &str) -> Option<String> {
    if attribute.contains("batter") {
        return Some("false".to_string());
    }
    if attribute.contains("dg_hz") || attribute.contains("dg_hs") || attribute.contains("hazmat") {
        return Some("not_applicable".to_string());
    }
    if attribute.contains("unit_of_measure") {
        if attribute.contains("weight") {
            return Some("grams".to_string());
        }
        return Some("centimeters".to_string());
    }
    None
}

/// Required attributes of the category whose columns hold no value after
/// planning, reported by display label.
fn missing_required_labels(
    layout: &LayoutDescriptor,
    category: &str,
    row_edits: &BTreeMap<usize, String>,
) -> Vec<String> {
    layout
        .required_attributes_by_category
        .get(&category.trim().to_lowercase())
        .map(|attrs| {
            attrs
                .iter()
                .filter(|attr| {
                    match layout.internal_attributes.get(*attr) {
                        Some(col) => !row_edits.contains_key(&col.column_index),
                        None => true,
                    }
                })
                .map(|attr| layout.display_label(attr).to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Resolve a sheet name to its part path inside the archive, e.g.
/// "Vorlage" -> "xl/worksheets/sheet1.xml", via workbook.xml and its
/// relationship table.
pub fn sheet_part_path(workbook: &[u8], sheet_name: &str) -> Result<String> {
    let mut archive =
        ZipArchive::new(Cursor::new(workbook)).context("failed to open workbook archive")?;

    let workbook_xml = read_archive_entry(&mut archive, "xl/workbook.xml")?;
    let workbook_text = String::from_utf8(workbook_xml).context("workbook.xml is not UTF-8")?;
    let doc = roxmltree::Document::parse(&workbook_text).context("malformed workbook.xml")?;

    let rid = doc
        .descendants()
        .find(|n| n.has_tag_name(("http://schemas.openxmlformats.org/spreadsheetml/2006/main", "sheet"))
            && n.attribute("name") == Some(sheet_name))
        .and_then(|n| n.attributes().find(|a| a.name() == "id").map(|a| a.value().to_string()))
        .ok_or_else(|| anyhow!("sheet '{}' not found in workbook.xml", sheet_name))?;

    let rels_xml = read_archive_entry(&mut archive, "xl/_rels/workbook.xml.rels")?;
    let rels_text = String::from_utf8(rels_xml).context("workbook rels is not UTF-8")?;
    let rels = roxmltree::Document::parse(&rels_text).context("malformed workbook rels")?;

    let target = rels
        .descendants()
        .find(|n| n.tag_name().name() == "Relationship" && n.attribute("Id") == Some(rid.as_str()))
        .and_then(|n| n.attribute("Target"))
        .ok_or_else(|| anyhow!("relationship '{}' not found for sheet '{}'", rid, sheet_name))?;

    let path = if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else {
        format!("xl/{}", target)
    };
    debug!("sheet '{}' resolves to part '{}'", sheet_name, path);
    Ok(path)
}

fn read_archive_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("archive entry '{}' missing", name))?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Repack the archive: the sheet part gets patched, every other entry is
/// raw-copied so its bytes (macro payload included) survive untouched.
pub fn apply_cell_edits(
    workbook: &[u8],
    part_path: &str,
    edits: &BTreeMap<u32, BTreeMap<usize, String>>,
) -> Result<Vec<u8>> {
    let mut archive =
        ZipArchive::new(Cursor::new(workbook)).context("failed to open workbook archive")?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut patched = false;

    for index in 0..archive.len() {
        let name = archive.by_index_raw(index)?.name().to_string();
        if name == part_path {
            let original = read_archive_entry_by_index(&mut archive, index)?;
            let rewritten = patch_sheet_xml(&original, edits)
                .with_context(|| format!("failed to patch '{}'", part_path))?;
            let options =
                FileOptions::default().compression_method(CompressionMethod::Deflated);
            writer.start_file(name.as_str(), options)?;
            writer.write_all(&rewritten)?;
            patched = true;
        } else {
            let entry = archive.by_index_raw(index)?;
            writer.raw_copy_file(entry)?;
        }
    }

    if !patched {
        bail!("sheet part '{}' not present in archive", part_path);
    }
    Ok(writer.finish()?.into_inner())
}

fn read_archive_entry_by_index(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    index: usize,
) -> Result<Vec<u8>> {
    let mut entry = archive.by_index(index)?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Stream the sheet XML, replacing or inserting exactly the edited
/// cells. Row and cell insertion keeps spreadsheetML's ascending order
/// so Excel accepts the part without repair.
pub fn patch_sheet_xml(
    xml: &[u8],
    edits: &BTreeMap<u32, BTreeMap<usize, String>>,
) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut skip_buf = Vec::new();

    // Rows not yet written, consumed as the stream passes their position.
    let mut pending_rows: BTreeMap<u32, BTreeMap<usize, String>> = edits.clone();
    // Cells of the row currently open, keyed by column.
    let mut current_row: Option<u32> = None;
    let mut pending_cells: BTreeMap<usize, String> = BTreeMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) if e.name().as_ref() == b"row" => {
                let row_num = row_number(&e)?;
                flush_rows_before(&mut writer, &mut pending_rows, row_num)?;
                if let Some(cells) = pending_rows.remove(&row_num) {
                    current_row = Some(row_num);
                    pending_cells = cells;
                }
                writer.write_event(Event::Start(e.into_owned()))?;
            }
            Event::Empty(e) if e.name().as_ref() == b"row" => {
                let row_num = row_number(&e)?;
                flush_rows_before(&mut writer, &mut pending_rows, row_num)?;
                if let Some(cells) = pending_rows.remove(&row_num) {
                    // Self-closing row gains content: reopen it.
                    writer.write_event(Event::Start(e.into_owned()))?;
                    write_cells(&mut writer, row_num, &cells)?;
                    writer.write_event(Event::End(BytesEnd::new("row")))?;
                } else {
                    writer.write_event(Event::Empty(e.into_owned()))?;
                }
            }
            Event::End(e) if e.name().as_ref() == b"row" => {
                if let Some(row_num) = current_row.take() {
                    let cells = std::mem::take(&mut pending_cells);
                    write_cells(&mut writer, row_num, &cells)?;
                }
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Event::Start(e) if e.name().as_ref() == b"c" && current_row.is_some() => {
                let row_num = current_row.unwrap_or_default();
                let col = cell_column(&e)?;
                flush_cells_before(&mut writer, row_num, &mut pending_cells, col)?;
                if let Some(value) = pending_cells.remove(&col) {
                    // Replace the whole cell, discarding its old content.
                    reader.read_to_end_into(QName(b"c"), &mut skip_buf)?;
                    write_inline_cell(&mut writer, row_num, col, &value)?;
                } else {
                    writer.write_event(Event::Start(e.into_owned()))?;
                }
            }
            Event::Empty(e) if e.name().as_ref() == b"c" && current_row.is_some() => {
                let row_num = current_row.unwrap_or_default();
                let col = cell_column(&e)?;
                flush_cells_before(&mut writer, row_num, &mut pending_cells, col)?;
                if let Some(value) = pending_cells.remove(&col) {
                    write_inline_cell(&mut writer, row_num, col, &value)?;
                } else {
                    writer.write_event(Event::Empty(e.into_owned()))?;
                }
            }
            Event::End(e) if e.name().as_ref() == b"sheetData" => {
                let remaining = std::mem::take(&mut pending_rows);
                for (row_num, cells) in remaining {
                    write_row(&mut writer, row_num, &cells)?;
                }
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Event::Empty(e) if e.name().as_ref() == b"sheetData" && !pending_rows.is_empty() => {
                // Empty sheet gains its first rows.
                writer.write_event(Event::Start(e.into_owned()))?;
                let remaining = std::mem::take(&mut pending_rows);
                for (row_num, cells) in remaining {
                    write_row(&mut writer, row_num, &cells)?;
                }
                writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
            }
            other => writer.write_event(other.into_owned())?,
        }
        buf.clear();
    }

    Ok(writer.into_inner().into_inner())
}

fn row_number(e: &BytesStart<'_>) -> Result<u32> {
    let attr = e
        .try_get_attribute("r")?
        .ok_or_else(|| anyhow!("row element without r attribute"))?;
    let text = String::from_utf8_lossy(&attr.value).into_owned();
    text.parse()
        .with_context(|| format!("bad row number '{}'", text))
}

fn cell_column(e: &BytesStart<'_>) -> Result<usize> {
    let attr = e
        .try_get_attribute("r")?
        .ok_or_else(|| anyhow!("cell element without r attribute"))?;
    let text = String::from_utf8_lossy(&attr.value).into_owned();
    split_cell_ref(&text)
        .map(|(_, col)| col)
        .ok_or_else(|| anyhow!("bad cell reference '{}'", text))
}

fn flush_rows_before<W: Write>(
    writer: &mut Writer<W>,
    pending_rows: &mut BTreeMap<u32, BTreeMap<usize, String>>,
    before: u32,
) -> Result<()> {
    let ready: Vec<u32> = pending_rows.range(..before).map(|(r, _)| *r).collect();
    for row_num in ready {
        if let Some(cells) = pending_rows.remove(&row_num) {
            write_row(writer, row_num, &cells)?;
        }
    }
    Ok(())
}

fn flush_cells_before<W: Write>(
    writer: &mut Writer<W>,
    row_num: u32,
    pending_cells: &mut BTreeMap<usize, String>,
    before: usize,
) -> Result<()> {
    let ready: Vec<usize> = pending_cells.range(..before).map(|(c, _)| *c).collect();
    for col in ready {
        if let Some(value) = pending_cells.remove(&col) {
            write_inline_cell(writer, row_num, col, &value)?;
        }
    }
    Ok(())
}

fn write_row<W: Write>(
    writer: &mut Writer<W>,
    row_num: u32,
    cells: &BTreeMap<usize, String>,
) -> Result<()> {
    let mut row = BytesStart::new("row");
    row.push_attribute(("r", row_num.to_string().as_str()));
    writer.write_event(Event::Start(row))?;
    write_cells(writer, row_num, cells)?;
    writer.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}

fn write_cells<W: Write>(
    writer: &mut Writer<W>,
    row_num: u32,
    cells: &BTreeMap<usize, String>,
) -> Result<()> {
    for (col, value) in cells {
        write_inline_cell(writer, row_num, *col, value)?;
    }
    Ok(())
}

/// Emit one `<c>` element carrying an inline string. Inline strings keep
/// the shared-strings table untouched.
fn write_inline_cell<W: Write>(
    writer: &mut Writer<W>,
    row_num: u32,
    col: usize,
    value: &str,
) -> Result<()> {
    let cell_ref = format!("{}{}", column_letter(col), row_num);
    let mut cell = BytesStart::new("c");
    cell.push_attribute(("r", cell_ref.as_str()));
    cell.push_attribute(("t", "inlineStr"));
    writer.write_event(Event::Start(cell))?;
    writer.write_event(Event::Start(BytesStart::new("is")))?;
    let mut text_el = BytesStart::new("t");
    text_el.push_attribute(("xml:space", "preserve"));
    writer.write_event(Event::Start(text_el))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new("t")))?;
    writer.write_event(Event::End(BytesEnd::new("is")))?;
    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}
