// tests/common/mod.rs
//
// Workbook fixtures for the integration tests, synthesized with
// rust_xlsxwriter so every test starts from a real zip archive.
#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use rust_xlsxwriter::Workbook;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use template_rs::core::scan::WorkbookScanner;

pub const MACRO_PAYLOAD: &[u8] = b"\xD0\xCF\x11\xE0 fake vba project blob";

/// A German seller template in the XML dialect: banner rows above the
/// header, display header on row 4, internal attribute ids on row 5,
/// an example product on row 6.
pub fn xml_template() -> Vec<u8> {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Vorlage").unwrap();
    sheet.write_string(0, 0, "Vorlage für Angebotsaktion").unwrap();
    sheet.write_string(1, 0, "Version 2024.1").unwrap();

    let headers = [
        "Verkäufer-SKU",
        "Produkttyp",
        "Marke",
        "Produktname",
        "EAN",
        "Farbe",
        "Größe",
        "Material",
        "Aufzählungspunkt 1",
        "Aufzählungspunkt 2",
        "Aufzählungspunkt 3",
        "Suchbegriffe",
        "Produktbeschreibung",
        "Angebotsaktion",
    ];
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(3, col as u16, *header).unwrap();
    }

    let attributes = [
        "item_sku",
        "feed_product_type",
        "brand_name",
        "item_name",
        "external_product_id",
        "color_name",
        "size_name",
        "material_type",
        "bullet_point1",
        "bullet_point2",
        "bullet_point3",
        "generic_keywords",
        "product_description",
        "offer_action",
    ];
    for (col, attribute) in attributes.iter().enumerate() {
        sheet.write_string(4, col as u16, *attribute).unwrap();
    }

    // example row
    sheet.write_string(5, 0, "EXAMPLE-001").unwrap();
    sheet.write_string(5, 1, "kitchen").unwrap();
    sheet.write_string(5, 2, "Beispielmarke").unwrap();
    sheet.write_string(5, 3, "Beispielprodukt").unwrap();
    // pad the populated area so size-based sheet detection would also work
    sheet.write_string(11, 13, "").unwrap();

    let defs = workbook.add_worksheet();
    defs.set_name("Datendefinitionen").unwrap();
    defs.write_string(0, 0, "Felddefinitionen").unwrap();
    defs.write_string(1, 0, "Feldname").unwrap();
    defs.write_string(1, 1, "Lokale Bezeichnung").unwrap();
    defs.write_string(1, 2, "Pflichtfeld?").unwrap();
    let rows = [
        ("item_sku", "SKU des Verkäufers", "Pflichtfeld"),
        ("brand_name", "Markenname", "Erforderlich"),
        ("item_name", "Produktname", "Pflichtfeld"),
        ("external_product_id", "EAN", "Pflichtfeld"),
        ("color_name", "Farbe", "Optional"),
        ("material_type", "Material", "Optional"),
    ];
    for (i, (attr, label, flag)) in rows.iter().enumerate() {
        let row = 2 + i as u32;
        defs.write_string(row, 0, *attr).unwrap();
        defs.write_string(row, 1, *label).unwrap();
        defs.write_string(row, 2, *flag).unwrap();
    }

    let matrix = workbook.add_worksheet();
    matrix.set_name("AttributePTDMAP").unwrap();
    matrix.write_string(0, 0, "Attribut").unwrap();
    matrix.write_string(0, 1, "kitchen").unwrap();
    matrix.write_string(0, 2, "garden").unwrap();
    // item_sku required everywhere, external_product_id only for kitchen
    matrix.write_string(1, 0, "item_sku").unwrap();
    matrix.write_string(1, 1, "x").unwrap();
    matrix.write_string(1, 2, "x").unwrap();
    matrix.write_string(2, 0, "external_product_id").unwrap();
    matrix.write_string(2, 1, "x").unwrap();
    matrix.write_string(2, 2, "0").unwrap();
    matrix.write_string(3, 0, "brand_name").unwrap();
    matrix.write_string(3, 1, "nein").unwrap();
    matrix.write_string(3, 2, "x").unwrap();

    let valid = workbook.add_worksheet();
    valid.set_name("Gültige Werte").unwrap();
    valid
        .write_string(0, 1, "Produktkategorisierung/GPSR [kitchen]")
        .unwrap();
    valid.write_string(0, 2, "Töpfe").unwrap();
    valid.write_string(0, 3, "Pfannen").unwrap();
    valid
        .write_string(1, 1, "Produktkategorisierung/GPSR [garden]")
        .unwrap();
    valid.write_string(1, 2, "Gartenmöbel").unwrap();

    let lists = workbook.add_worksheet();
    lists.set_name("Listen").unwrap();
    for (i, option) in ["kitchen", "garden", "toys", "pets", "kitchen"].iter().enumerate() {
        lists.write_string(1 + i as u32, 0, *option).unwrap();
    }
    // leftover list from an older template revision
    for (i, option) in ["outdated-a", "outdated-b", "outdated-c", "outdated-d"]
        .iter()
        .enumerate()
    {
        lists.write_string(1 + i as u32, 1, *option).unwrap();
    }
    workbook
        .define_name("product_type1.value", "=Listen!$A$2:$A$6")
        .unwrap();
    workbook
        .define_name("product_type2.value", "=Listen!$B$2:$B$5")
        .unwrap();

    workbook.save_to_buffer().unwrap()
}

/// The flat-file dialect: Update/Delete banner on row 1, display header
/// on row 2, attribute ids on row 3, data from row 4, category first.
pub fn flat_template() -> Vec<u8> {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Vorlage").unwrap();
    sheet.write_string(0, 0, "Flat-File Vorlage").unwrap();

    let headers = [
        "Produkttyp",
        "Verkäufer-SKU",
        "Marke",
        "Titel",
        "EAN",
        "Farbe",
        "Aufzählungspunkt 1",
        "Suchbegriffe",
        "Update/Delete",
    ];
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(1, col as u16, *header).unwrap();
    }
    let attributes = [
        "feed_product_type",
        "item_sku",
        "brand_name",
        "item_name",
        "external_product_id",
        "color_name",
        "bullet_point1",
        "generic_keywords",
        "update_delete",
    ];
    for (col, attribute) in attributes.iter().enumerate() {
        sheet.write_string(2, col as u16, *attribute).unwrap();
    }
    sheet.write_string(11, 11, "").unwrap();

    workbook.save_to_buffer().unwrap()
}

/// A workbook with no recognizable header anywhere.
pub fn unrecognizable_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Notizen").unwrap();
    sheet.write_string(0, 0, "nichts hier").unwrap();
    sheet.write_string(2, 1, "immer noch nichts").unwrap();
    workbook.save_to_buffer().unwrap()
}

/// Add an extra archive entry, the way .xlsm files carry vbaProject.bin.
pub fn inject_entry(workbook: &[u8], name: &str, payload: &[u8]) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(workbook)).unwrap();
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).unwrap();
        writer.raw_copy_file(entry).unwrap();
    }
    writer.start_file(name, FileOptions::default()).unwrap();
    writer.write_all(payload).unwrap();
    writer.finish().unwrap().into_inner()
}

/// Raw bytes of one archive entry.
pub fn entry_bytes(workbook: &[u8], name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(workbook)).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf).unwrap();
    buf
}

/// Read one cell back through the crate's own scanner.
pub fn read_cell(workbook: &[u8], sheet: &str, row: u32, col: usize) -> Option<String> {
    let mut scanner = WorkbookScanner::from_bytes(workbook.to_vec()).unwrap();
    let grid = scanner.grid(sheet).unwrap();
    grid.cell_text(row, col)
}
