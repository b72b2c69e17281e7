//! Raw extraction results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Fields the extractor knows how to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Abstract,
    Claims,
    Description,
    Inventors,
    Assignee,
    PriorityDate,
    PublicationDate,
    FilingDate,
    ApplicationNumber,
    PublicationNumber,
    DocumentType,
    CountryCode,
    CountryName,
    PdfUrl,
    Classifications,
    Citations,
    LegalEvents,
    ClaimDetails,
    PriorityClaims,
    PriorityApplications,
    Events,
    SimilarDocuments,
    Relations,
}

impl Field {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Abstract => "abstract",
            Self::Claims => "claims",
            Self::Description => "description",
            Self::Inventors => "inventors",
            Self::Assignee => "assignee",
            Self::PriorityDate => "priority_date",
            Self::PublicationDate => "publication_date",
            Self::FilingDate => "filing_date",
            Self::ApplicationNumber => "application_number",
            Self::PublicationNumber => "publication_number",
            Self::DocumentType => "document_type",
            Self::CountryCode => "country_code",
            Self::CountryName => "country_name",
            Self::PdfUrl => "pdf_url",
            Self::Classifications => "classifications",
            Self::Citations => "citations",
            Self::LegalEvents => "legal_events",
            Self::ClaimDetails => "claim_details",
            Self::PriorityClaims => "priority_claims",
            Self::PriorityApplications => "priority_applications",
            Self::Events => "events",
            Self::SimilarDocuments => "similar_documents",
            Self::Relations => "relations",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One table row: cell name to every value the cell's probe matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Record {
    cells: BTreeMap<String, Vec<String>>,
}

impl Record {
    pub fn insert(&mut self, cell: impl Into<String>, values: Vec<String>) {
        self.cells.insert(cell.into(), values);
    }

    /// First value of a cell, if the cell matched anything.
    #[must_use]
    pub fn first(&self, cell: &str) -> Option<&str> {
        self.cells
            .get(cell)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of a cell; empty when the cell matched nothing.
    #[must_use]
    pub fn all(&self, cell: &str) -> &[String] {
        self.cells.get(cell).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Raw value of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// The grammar looked for the field and the page does not have it.
    Missing,
    Text(String),
    List(Vec<String>),
    Table(Vec<Record>),
}

impl FieldValue {
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// Every field the grammar looked for, keyed by field.
///
/// `get` returns `None` for fields the grammar has no rule for, and
/// `Some(FieldValue::Missing)` for fields it looked for but did not find.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedFields {
    values: BTreeMap<Field, FieldValue>,
}

impl ExtractedFields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, value: FieldValue) {
        self.values.insert(field, value);
    }

    #[must_use]
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    /// Fields that were looked for and not found.
    pub fn missing(&self) -> impl Iterator<Item = Field> + '_ {
        self.values
            .iter()
            .filter(|(_, value)| value.is_missing())
            .map(|(field, _)| *field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.values.iter().map(|(field, value)| (*field, value))
    }
}
