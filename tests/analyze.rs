// tests/analyze.rs
mod common;

use template_rs::core::analyzer::analyze_workbook;
use template_rs::core::scan::WorkbookScanner;
use template_rs::FormatKind;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn xml_template_analysis_end_to_end() {
    init_logs();
    let bytes = common::xml_template();
    let mut scanner = WorkbookScanner::from_bytes(bytes).unwrap();
    let layout = analyze_workbook(&mut scanner).unwrap();

    assert_eq!(layout.format_kind, FormatKind::Xml);
    assert_eq!(layout.sheet_name, "Vorlage");
    assert_eq!(layout.header_row, 4);
    assert_eq!(layout.internal_attribute_row, Some(5));
    assert_eq!(layout.example_row, Some(6));
    assert_eq!(layout.first_data_row, 7);

    // semantic fields
    let sku = layout.field_positions.get("SKU").unwrap();
    assert_eq!(sku.column_index, 0);
    assert_eq!(sku.column, "A");
    assert_eq!(
        layout.field_positions.get("Product Type").map(|c| c.column_index),
        Some(1)
    );
    assert_eq!(layout.field_positions.get("Brand").map(|c| c.column_index), Some(2));
    assert_eq!(layout.field_positions.get("Title").map(|c| c.column_index), Some(3));
    assert_eq!(layout.bullet_columns().len(), 3);
    assert_eq!(layout.search_term_columns().len(), 1);
    assert!(layout.field_positions.contains_key("Offer Action"));

    // internal attributes are a separate namespace
    assert_eq!(
        layout.internal_attributes.get("item_sku").map(|c| c.column_index),
        Some(0)
    );
    assert_eq!(
        layout.internal_attributes.get("generic_keywords").map(|c| c.column_index),
        Some(11)
    );

    assert_eq!(layout.example_category.as_deref(), Some("kitchen"));

    // definitions sheet
    assert!(layout.globally_required_attributes.contains("item_sku"));
    assert!(layout.globally_required_attributes.contains("external_product_id"));
    assert!(!layout.globally_required_attributes.contains("color_name"));
    assert_eq!(layout.required_fields.len(), 4);
    assert_eq!(layout.optional_fields.len(), 2);
    assert_eq!(
        layout.attribute_display_labels.get("item_sku").map(String::as_str),
        Some("SKU des Verkäufers")
    );

    // category matrix refines the global set
    assert_eq!(
        layout.required_attributes_by_category.get("kitchen").unwrap(),
        &vec!["item_sku".to_string(), "external_product_id".to_string()]
    );
    assert_eq!(
        layout.required_attributes_by_category.get("garden").unwrap(),
        &vec!["item_sku".to_string(), "brand_name".to_string()]
    );
    assert_eq!(
        layout.required_display_labels("Kitchen"),
        vec!["SKU des Verkäufers".to_string(), "EAN".to_string()]
    );

    // vocabulary: only the first defined name that yields values counts,
    // so the outdated second list contributes nothing
    assert_eq!(layout.category_options, vec!["kitchen", "garden", "toys", "pets"]);
    assert!(!layout.category_options.iter().any(|o| o.starts_with("outdated")));
    assert_eq!(
        layout.classification_values_by_category.get("kitchen").unwrap(),
        &vec!["Töpfe".to_string(), "Pfannen".to_string()]
    );
}

#[test]
fn flat_file_template_analysis() {
    let bytes = common::flat_template();
    let mut scanner = WorkbookScanner::from_bytes(bytes).unwrap();
    let layout = analyze_workbook(&mut scanner).unwrap();

    assert_eq!(layout.format_kind, FormatKind::FlatFile);
    assert_eq!(layout.header_row, 2);
    assert_eq!(layout.internal_attribute_row, Some(3));
    assert_eq!(layout.example_row, None);
    assert_eq!(layout.first_data_row, 4);
    assert!(layout.field_positions.contains_key("Update/Delete"));
    assert_eq!(
        layout.field_positions.get("Product Type").map(|c| c.column_index),
        Some(0)
    );
    assert_eq!(layout.field_positions.get("SKU").map(|c| c.column_index), Some(1));

    // no auxiliary sheets: everything degrades to empty, not an error
    assert!(layout.globally_required_attributes.is_empty());
    assert!(layout.category_options.is_empty());
    assert!(layout.required_attributes_by_category.is_empty());
    assert!(layout.classification_values_by_category.is_empty());
}

#[test]
fn unrecognizable_workbook_fails_clearly() {
    let bytes = common::unrecognizable_workbook();
    let mut scanner = WorkbookScanner::from_bytes(bytes).unwrap();
    let err = analyze_workbook(&mut scanner).unwrap_err();
    assert!(err.to_string().contains("unrecognized template"));
}

#[test]
fn session_opens_from_a_file_on_disk() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vorlage.xlsm");
    std::fs::write(&path, common::xml_template()).unwrap();

    let session = template_rs::ListingSession::from_path(&path).unwrap();
    assert_eq!(session.layout().sheet_name, "Vorlage");
    assert_eq!(session.layout().first_data_row, 7);
}

#[test]
fn layout_serializes_for_the_presentation_layer() {
    let bytes = common::xml_template();
    let session = template_rs::ListingSession::from_bytes(bytes).unwrap();
    let json = session.layout_json().unwrap();
    assert!(json.contains("\"format_kind\""));
    assert!(json.contains("\"Vorlage\""));
    assert!(json.contains("item_sku"));
}
