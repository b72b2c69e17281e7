//! Core data types for the harvester.
//!
//! [`PatentDocument`] is the record handed back to callers. It is built once
//! by the normalizer and never mutated afterwards, except that the facade
//! fills in `pdf_path` before returning it.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::identifier::PatentIdentifier;

/// How a cited document relates to the patent.
///
/// Labels the page uses that are not known here are kept verbatim in
/// [`CitationRelation::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CitationRelation {
    /// Cited by this patent, added by the examiner.
    CitedByExaminer,
    /// Cited by this patent, supplied by the applicant.
    CitedByApplicant,
    /// Later documents citing this patent.
    CitedBy,
    /// Documents cited by members of this patent's family.
    FamilyCites,
    /// Documents citing members of this patent's family.
    FamilyCitedBy,
    /// Any other label, as found on the page.
    Other(String),
}

impl CitationRelation {
    /// Map a row's relation label and examiner marker onto a relation.
    #[must_use]
    pub fn from_label(label: &str, examiner_cited: bool) -> Self {
        match label {
            "backwardReferencesOrig" | "backwardReferences" if examiner_cited => {
                Self::CitedByExaminer
            }
            "backwardReferencesOrig" | "backwardReferences" => Self::CitedByApplicant,
            "forwardReferencesOrig" | "forwardReferences" => Self::CitedBy,
            "backwardReferencesFamily" => Self::FamilyCites,
            "forwardReferencesFamily" => Self::FamilyCitedBy,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CitedByExaminer => "cited_by_examiner",
            Self::CitedByApplicant => "cited_by_applicant",
            Self::CitedBy => "cited_by",
            Self::FamilyCites => "family_cites",
            Self::FamilyCitedBy => "family_cited_by",
            Self::Other(label) => label,
        }
    }
}

impl fmt::Display for CitationRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for CitationRelation {
    fn from(value: String) -> Self {
        match value.as_str() {
            "cited_by_examiner" => Self::CitedByExaminer,
            "cited_by_applicant" => Self::CitedByApplicant,
            "cited_by" => Self::CitedBy,
            "family_cites" => Self::FamilyCites,
            "family_cited_by" => Self::FamilyCitedBy,
            _ => Self::Other(value),
        }
    }
}

impl From<CitationRelation> for String {
    fn from(value: CitationRelation) -> Self {
        match value {
            CitationRelation::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

/// A document cited by, or citing, the patent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Publication number of the other document, as printed.
    pub identifier: String,
    pub relation: CitationRelation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<NaiveDate>,
}

/// An entry from the legal-status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalEvent {
    pub date: Option<NaiveDate>,
    /// Event code (open vocabulary, e.g. `AS`, `STCF`).
    pub code: Option<String>,
    pub description: Option<String>,
    /// Attribute lines such as "Owner name: ...".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// A CPC classification entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub code: String,
    /// Whether the page marks this as the first (main) classification.
    #[serde(default)]
    pub first: bool,
}

/// Number and dependency of one claim, in the same order as the claim texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDetail {
    pub number: Option<u32>,
    /// Numbers of the claims this one refers back to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<u32>,
}

impl ClaimDetail {
    #[must_use]
    pub fn is_dependent(&self) -> bool {
        !self.depends_on.is_empty()
    }
}

/// An application this patent claims priority from, or one claiming priority
/// from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityApplication {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filing_date: Option<NaiveDate>,
    /// Filed as a US provisional application.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub us_provisional: bool,
}

/// A milestone on the application timeline (filing, grant, expiry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub date: Option<NaiveDate>,
    pub title: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// The page flags the event as critical (e.g. anticipated expiration).
    #[serde(default)]
    pub critical: bool,
}

/// A document the site lists as similar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarDocument {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// False for non-patent literature.
    #[serde(default)]
    pub is_patent: bool,
}

/// The structured record produced for one patent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatentDocument {
    pub id: PatentIdentifier,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// One element per claim; empty when the page lists none.
    pub claims: Vec<String>,
    /// Paragraphs separated by blank lines.
    pub description: Option<String>,
    pub inventors: Vec<String>,
    pub assignee: Option<String>,
    pub priority_date: Option<NaiveDate>,
    pub publication_date: Option<NaiveDate>,
    pub filing_date: Option<NaiveDate>,
    pub application_number: Option<String>,
    /// Publication number as printed on the page.
    pub publication_number: Option<String>,
    pub document_type: Option<String>,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    /// PDF location advertised by the page.
    pub pdf_url: Option<String>,
    pub classifications: Vec<Classification>,
    pub citations: Vec<Citation>,
    pub legal_events: Vec<LegalEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub claim_details: Vec<ClaimDetail>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub priority_claims: Vec<PriorityApplication>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub priority_applications: Vec<PriorityApplication>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<TimelineEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub similar_documents: Vec<SimilarDocument>,
    /// Related publications from the page metadata (family members, priority documents).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<String>,
    /// Where the PDF was stored; set only when a requested download succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
    /// Non-fatal notes collected while building the record.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl PatentDocument {
    /// Citations with the given relation.
    pub fn citations_by<'a>(
        &'a self,
        relation: &'a CitationRelation,
    ) -> impl Iterator<Item = &'a Citation> + 'a {
        self.citations.iter().filter(move |c| &c.relation == relation)
    }
}
