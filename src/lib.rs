pub mod core {
    pub mod analyzer;
    pub mod definitions;
    pub mod detect;
    pub mod fields;
    pub mod layout;
    pub mod scan;
    pub mod vocab;
    pub mod writer;
}

pub mod utils {
    pub mod session;
}

use serde::{Deserialize, Serialize};

pub use crate::core::layout::{ColumnRef, FormatKind, LayoutDescriptor};
pub use crate::core::writer::{FillOutcome, RowDiagnostic, SourceRow};
pub use crate::utils::session::ListingSession;

/// Listing length budgets in bytes (UTF-8). Umlauts count double, so the
/// upstream character limits translate into these byte ceilings.
pub const TITLE_MAX_BYTES: usize = 200;
pub const BULLET_MAX_BYTES: usize = 200;
pub const SEARCH_TERMS_MAX_BYTES: usize = 250;
pub const DESCRIPTION_MAX_BYTES: usize = 2000;

/// Number of bullet point / search term slots a listing carries.
pub const CONTENT_SLOTS: usize = 5;

/// Structured listing content returned by the external text generation
/// service. The engine only consumes this; it never produces it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedContent {
    pub title: String,
    /// Expected to hold exactly [`CONTENT_SLOTS`] entries; the filler
    /// tolerates fewer and ignores extras.
    pub bullet_points: Vec<String>,
    /// Comma-joined search terms, split on commas at fill time.
    pub search_terms: String,
    pub description: Option<String>,
}

impl GeneratedContent {
    /// Names of the fields that exceed their byte budget. Callers should
    /// check this before filling; the filler itself does not truncate.
    pub fn over_budget_fields(&self) -> Vec<&'static str> {
        let mut over = Vec::new();
        if self.title.len() > TITLE_MAX_BYTES {
            over.push("title");
        }
        if self.bullet_points.iter().any(|b| b.len() > BULLET_MAX_BYTES) {
            over.push("bullet_points");
        }
        if self.search_terms.len() > SEARCH_TERMS_MAX_BYTES {
            over.push("search_terms");
        }
        if let Some(desc) = &self.description {
            if desc.len() > DESCRIPTION_MAX_BYTES {
                over.push("description");
            }
        }
        over
    }

    pub fn within_budgets(&self) -> bool {
        self.over_budget_fields().is_empty()
    }
}

/// External text generation collaborator. One blocking round trip per
/// product row; no retry or backoff lives in the engine, and a returned
/// error means "no usable payload for this row".
pub trait ContentGenerator {
    fn generate(
        &self,
        product_context: &str,
        instructions: &str,
    ) -> anyhow::Result<GeneratedContent>;
}

/// Flatten a source product row into the plain-text context passed to the
/// generation service. Prompt wording is the caller's business; this only
/// hands over the data.
pub fn build_product_context(product: &SourceRow) -> String {
    product
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(label, value)| format!("{}: {}", label, value.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}
