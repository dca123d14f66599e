// src/utils/session.rs
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::core::analyzer::analyze_workbook;
use crate::core::scan::{read_workbook_bytes, WorkbookScanner};
use crate::core::writer::{fill_products, FillOutcome, SourceRow};
use crate::{GeneratedContent, LayoutDescriptor};

/// One uploaded template plus its inferred layout. All state for a
/// listing run lives here; dropping the session discards everything.
pub struct ListingSession {
    template_bytes: Vec<u8>,
    layout: LayoutDescriptor,
}

impl ListingSession {
    /// Analyze a workbook held in memory and open a session over it.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let mut scanner = WorkbookScanner::from_bytes(bytes.clone())?;
        let layout = analyze_workbook(&mut scanner)?;
        info!("session opened over sheet '{}'", layout.sheet_name);
        Ok(Self {
            template_bytes: bytes,
            layout,
        })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = read_workbook_bytes(&path)
            .with_context(|| format!("cannot read {}", path.as_ref().display()))?;
        Self::from_bytes(bytes)
    }

    pub fn layout(&self) -> &LayoutDescriptor {
        &self.layout
    }

    /// Layout as JSON for the presentation layer.
    pub fn layout_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.layout).context("layout serialization failed")
    }

    /// Fill one product per data row and return the rewritten workbook.
    /// The session's own template bytes stay untouched, so repeated fill
    /// runs always start from the pristine upload.
    pub fn fill_products(
        &self,
        products: &[(SourceRow, GeneratedContent)],
    ) -> Result<FillOutcome> {
        fill_products(&self.template_bytes, &self.layout, products)
    }

    /// Display labels the seller still has to provide for a category.
    pub fn required_display_labels(&self, category: &str) -> Vec<String> {
        self.layout.required_display_labels(category)
    }
}
