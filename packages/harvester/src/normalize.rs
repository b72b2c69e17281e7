//! Turns raw extracted strings into a typed [`PatentDocument`].

use chrono::NaiveDate;

use crate::error::{HarvesterError, Result};
use crate::extract::{ExtractedFields, Field, FieldValue, Record};
use crate::identifier::PatentIdentifier;
use crate::text::{clean_optional, join_paragraphs};
use crate::types::{
    Citation, CitationRelation, ClaimDetail, Classification, LegalEvent, PatentDocument,
    PriorityApplication, SimilarDocument, TimelineEvent,
};

/// Accepted date layouts, tried in order.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];

/// Parse a date value. Empty means absent; anything else must be a date.
///
/// ```
/// use patent_harvester::normalize::parse_date;
///
/// let date = parse_date("priority_date", "2009-12-15").unwrap().unwrap();
/// assert_eq!(date.to_string(), "2009-12-15");
/// assert_eq!(parse_date("priority_date", "20091215").unwrap(), Some(date));
/// assert_eq!(parse_date("priority_date", "  ").unwrap(), None);
/// assert!(parse_date("priority_date", "soon").is_err());
/// ```
pub fn parse_date(field: &str, value: &str) -> Result<Option<NaiveDate>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .map(Some)
        .ok_or_else(|| HarvesterError::DateParse {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Build the record for `id` from the extractor's output.
///
/// Fails only on a malformed date; absent fields become `None` or empty lists.
pub fn normalize(id: PatentIdentifier, fields: ExtractedFields) -> Result<PatentDocument> {
    let mut warnings = Vec::new();

    let publication_number = text(&fields, Field::PublicationNumber);
    if let Some(printed) = &publication_number {
        let printed_compact: String = printed.split_whitespace().collect();
        if !printed_compact.eq_ignore_ascii_case(&id.to_string()) {
            tracing::warn!(%id, printed = %printed, "Page shows a different publication number");
            warnings.push(format!(
                "page shows publication number {printed}, requested {id}"
            ));
        }
    }

    let document = PatentDocument {
        title: text(&fields, Field::Title),
        abstract_text: text(&fields, Field::Abstract),
        claims: list(&fields, Field::Claims),
        description: description(&fields),
        inventors: list(&fields, Field::Inventors),
        assignee: text(&fields, Field::Assignee),
        priority_date: date(&fields, Field::PriorityDate)?,
        publication_date: date(&fields, Field::PublicationDate)?,
        filing_date: date(&fields, Field::FilingDate)?,
        application_number: text(&fields, Field::ApplicationNumber),
        publication_number,
        document_type: text(&fields, Field::DocumentType),
        country_code: text(&fields, Field::CountryCode),
        country_name: text(&fields, Field::CountryName),
        pdf_url: text(&fields, Field::PdfUrl),
        classifications: classifications(rows(&fields, Field::Classifications)),
        citations: citations(rows(&fields, Field::Citations), &mut warnings)?,
        legal_events: legal_events(rows(&fields, Field::LegalEvents))?,
        claim_details: claim_details(rows(&fields, Field::ClaimDetails)),
        priority_claims: priority_applications(&fields, Field::PriorityClaims)?,
        priority_applications: priority_applications(&fields, Field::PriorityApplications)?,
        events: timeline_events(rows(&fields, Field::Events))?,
        similar_documents: similar_documents(rows(&fields, Field::SimilarDocuments))?,
        relations: list(&fields, Field::Relations),
        pdf_path: None,
        warnings,
        id,
    };

    tracing::debug!(
        id = %document.id,
        claims = document.claims.len(),
        citations = document.citations.len(),
        legal_events = document.legal_events.len(),
        similar_documents = document.similar_documents.len(),
        "Normalized patent document"
    );

    Ok(document)
}

/// Scalar value; a list in a scalar slot contributes its first non-empty item.
fn text(fields: &ExtractedFields, field: Field) -> Option<String> {
    match fields.get(field)? {
        FieldValue::Text(value) => clean_optional(value),
        FieldValue::List(values) => values.iter().find_map(|v| clean_optional(v)),
        FieldValue::Missing | FieldValue::Table(_) => None,
    }
}

fn list(fields: &ExtractedFields, field: Field) -> Vec<String> {
    match fields.get(field) {
        Some(FieldValue::List(values)) => values.iter().filter_map(|v| clean_optional(v)).collect(),
        Some(FieldValue::Text(value)) => clean_optional(value).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn rows(fields: &ExtractedFields, field: Field) -> &[Record] {
    match fields.get(field) {
        Some(FieldValue::Table(records)) => records,
        _ => &[],
    }
}

fn description(fields: &ExtractedFields) -> Option<String> {
    match fields.get(Field::Description)? {
        FieldValue::List(paragraphs) => {
            let joined = join_paragraphs(paragraphs.as_slice());
            (!joined.is_empty()).then_some(joined)
        }
        FieldValue::Text(value) => clean_optional(value),
        FieldValue::Missing | FieldValue::Table(_) => None,
    }
}

fn date(fields: &ExtractedFields, field: Field) -> Result<Option<NaiveDate>> {
    match text(fields, field) {
        Some(value) => parse_date(field.as_str(), &value),
        None => Ok(None),
    }
}

fn cell(record: &Record, name: &str) -> Option<String> {
    record.first(name).and_then(clean_optional)
}

fn cell_date(record: &Record, table: Field, name: &str) -> Result<Option<NaiveDate>> {
    match cell(record, name) {
        Some(value) => parse_date(&format!("{table}.{name}"), &value),
        None => Ok(None),
    }
}

/// CPC entries, deduplicated by code in page order.
fn classifications(records: &[Record]) -> Vec<Classification> {
    let mut result: Vec<Classification> = Vec::new();
    for record in records {
        let Some(code) = cell(record, "code") else {
            continue;
        };
        let first = record.first("first").is_some_and(|v| v.trim() == "true");
        match result.iter_mut().find(|c| c.code == code) {
            Some(existing) => existing.first |= first,
            None => result.push(Classification { code, first }),
        }
    }
    result
}

fn citations(records: &[Record], warnings: &mut Vec<String>) -> Result<Vec<Citation>> {
    let mut result = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let label = cell(record, "relation").unwrap_or_default();
        let Some(identifier) = cell(record, "identifier") else {
            tracing::warn!(row = index, relation = %label, "Skipping citation row without identifier");
            warnings.push(format!(
                "skipped citation row {index} ({label}) without identifier"
            ));
            continue;
        };
        let examiner_cited = record.first("examiner").is_some_and(|v| v.trim() == "*");

        result.push(Citation {
            relation: CitationRelation::from_label(&label, examiner_cited),
            title: cell(record, "title"),
            assignee: cell(record, "assignee"),
            priority_date: cell_date(record, Field::Citations, "priority_date")?,
            publication_date: cell_date(record, Field::Citations, "publication_date")?,
            identifier,
        });
    }
    Ok(result)
}

fn legal_events(records: &[Record]) -> Result<Vec<LegalEvent>> {
    let mut result = Vec::with_capacity(records.len());
    for record in records {
        let event = LegalEvent {
            date: cell_date(record, Field::LegalEvents, "date")?,
            code: cell(record, "code"),
            description: cell(record, "description"),
            details: record
                .all("details")
                .iter()
                .filter_map(|d| clean_optional(d))
                .collect(),
        };
        if event.date.is_none()
            && event.code.is_none()
            && event.description.is_none()
            && event.details.is_empty()
        {
            continue;
        }
        result.push(event);
    }
    Ok(result)
}

/// `00002` and `CLM-00002` both read as claim 2.
fn claim_number(value: &str) -> Option<u32> {
    value
        .trim()
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .ok()
}

fn claim_details(records: &[Record]) -> Vec<ClaimDetail> {
    records
        .iter()
        .map(|record| {
            let mut depends_on: Vec<u32> = Vec::new();
            for number in record.all("refs").iter().filter_map(|r| claim_number(r)) {
                if !depends_on.contains(&number) {
                    depends_on.push(number);
                }
            }
            ClaimDetail {
                number: record.first("number").and_then(claim_number),
                depends_on,
            }
        })
        .collect()
}

fn is_flag(record: &Record, name: &str, marker: &str) -> bool {
    record
        .first(name)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(marker))
}

fn priority_applications(
    fields: &ExtractedFields,
    table: Field,
) -> Result<Vec<PriorityApplication>> {
    let mut result = Vec::new();
    for record in rows(fields, table) {
        let application = PriorityApplication {
            application_number: cell(record, "application_number"),
            title: cell(record, "title"),
            priority_date: cell_date(record, table, "priority_date")?,
            filing_date: cell_date(record, table, "filing_date")?,
            us_provisional: is_flag(record, "us_provisional", "true"),
        };
        if application.application_number.is_none() && application.title.is_none() {
            continue;
        }
        result.push(application);
    }
    Ok(result)
}

fn timeline_events(records: &[Record]) -> Result<Vec<TimelineEvent>> {
    let mut result = Vec::with_capacity(records.len());
    for record in records {
        let event = TimelineEvent {
            date: cell_date(record, Field::Events, "date")?,
            title: cell(record, "title"),
            kind: cell(record, "type"),
            critical: is_flag(record, "critical", "critical"),
        };
        if event.date.is_none() && event.title.is_none() {
            continue;
        }
        result.push(event);
    }
    Ok(result)
}

fn similar_documents(records: &[Record]) -> Result<Vec<SimilarDocument>> {
    let mut result = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        // Non-patent literature rows carry no publication number
        let Some(identifier) = cell(record, "identifier") else {
            tracing::debug!(row = index, "Skipping similar document without identifier");
            continue;
        };
        result.push(SimilarDocument {
            identifier,
            title: cell(record, "title"),
            publication_date: cell_date(record, Field::SimilarDocuments, "publication_date")?,
            language: cell(record, "language"),
            is_patent: is_flag(record, "is_patent", "true"),
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::validate;
    use pretty_assertions::assert_eq;

    fn id() -> PatentIdentifier {
        validate("US8400417B2").unwrap()
    }

    fn record(cells: &[(&str, &[&str])]) -> Record {
        let mut record = Record::default();
        for (name, values) in cells {
            record.insert(*name, values.iter().map(|v| v.to_string()).collect());
        }
        record
    }

    #[test]
    fn test_missing_fields_become_none() {
        let mut fields = ExtractedFields::new();
        fields.insert(Field::Abstract, FieldValue::Missing);
        fields.insert(Field::Claims, FieldValue::Missing);

        let doc = normalize(id(), fields).unwrap();
        assert_eq!(doc.abstract_text, None);
        assert!(doc.claims.is_empty());
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn test_free_text_is_cleaned() {
        let mut fields = ExtractedFields::new();
        fields.insert(
            Field::Abstract,
            FieldValue::Text("\n   A   computer\n implemented method. ".to_string()),
        );
        fields.insert(
            Field::Description,
            FieldValue::List(vec![
                "FIELD".to_string(),
                "  The  invention\n relates. ".to_string(),
                " ".to_string(),
            ]),
        );
        fields.insert(Field::Title, FieldValue::Text("   ".to_string()));

        let doc = normalize(id(), fields).unwrap();
        assert_eq!(doc.abstract_text.as_deref(), Some("A computer implemented method."));
        assert_eq!(doc.description.as_deref(), Some("FIELD\n\nThe invention relates."));
        assert_eq!(doc.title, None);
    }

    #[test]
    fn test_claims_stay_separate() {
        let mut fields = ExtractedFields::new();
        fields.insert(
            Field::Claims,
            FieldValue::List(vec![
                "1. A method comprising:\n  a step.".to_string(),
                "2. The method of claim 1.".to_string(),
            ]),
        );
        let doc = normalize(id(), fields).unwrap();
        assert_eq!(
            doc.claims,
            vec![
                "1. A method comprising: a step.".to_string(),
                "2. The method of claim 1.".to_string()
            ]
        );
    }

    #[test]
    fn test_dates() {
        let mut fields = ExtractedFields::new();
        fields.insert(Field::PriorityDate, FieldValue::Text("2009-12-15".to_string()));
        fields.insert(Field::PublicationDate, FieldValue::Text("20130319".to_string()));
        fields.insert(Field::FilingDate, FieldValue::Missing);

        let doc = normalize(id(), fields).unwrap();
        assert_eq!(doc.priority_date, NaiveDate::from_ymd_opt(2009, 12, 15));
        assert_eq!(doc.publication_date, NaiveDate::from_ymd_opt(2013, 3, 19));
        assert_eq!(doc.filing_date, None);
    }

    #[test]
    fn test_malformed_date_fails() {
        let mut fields = ExtractedFields::new();
        fields.insert(Field::FilingDate, FieldValue::Text("March 2010".to_string()));

        let err = normalize(id(), fields).unwrap_err();
        assert!(matches!(
            err,
            HarvesterError::DateParse { field, value } if field == "filing_date" && value == "March 2010"
        ));
    }

    #[test]
    fn test_citations() {
        let mut fields = ExtractedFields::new();
        fields.insert(
            Field::Citations,
            FieldValue::Table(vec![
                record(&[
                    ("relation", &["backwardReferencesOrig"]),
                    ("examiner", &["*"]),
                    ("identifier", &["US5128672A"]),
                    ("title", &[" Dynamic  predictive keyboard "]),
                    ("priority_date", &["1990-10-30"]),
                ]),
                record(&[
                    ("relation", &["backwardReferencesOrig"]),
                    ("identifier", &["US6094197A"]),
                ]),
                record(&[("relation", &["forwardReferencesOrig"]), ("identifier", &[])]),
                record(&[
                    ("relation", &["similarDocuments"]),
                    ("identifier", &["EP1A1"]),
                ]),
            ]),
        );

        let doc = normalize(id(), fields).unwrap();
        assert_eq!(doc.citations.len(), 3);
        assert_eq!(doc.citations[0].relation, CitationRelation::CitedByExaminer);
        assert_eq!(doc.citations[0].title.as_deref(), Some("Dynamic predictive keyboard"));
        assert_eq!(doc.citations[0].priority_date, NaiveDate::from_ymd_opt(1990, 10, 30));
        assert_eq!(doc.citations[1].relation, CitationRelation::CitedByApplicant);
        assert_eq!(
            doc.citations[2].relation,
            CitationRelation::Other("similarDocuments".to_string())
        );
        assert_eq!(doc.warnings.len(), 1);
        assert!(doc.warnings[0].contains("forwardReferencesOrig"));
    }

    #[test]
    fn test_legal_events() {
        let mut fields = ExtractedFields::new();
        fields.insert(
            Field::LegalEvents,
            FieldValue::Table(vec![
                record(&[
                    ("date", &["2010-02-25"]),
                    ("code", &["AS"]),
                    ("description", &["Assignment"]),
                    ("details", &["Owner name: GOOGLE INC.", " Free format text: ASSIGNMENT "]),
                ]),
                record(&[("code", &[" "])]),
            ]),
        );

        let doc = normalize(id(), fields).unwrap();
        assert_eq!(
            doc.legal_events,
            vec![LegalEvent {
                date: NaiveDate::from_ymd_opt(2010, 2, 25),
                code: Some("AS".to_string()),
                description: Some("Assignment".to_string()),
                details: vec![
                    "Owner name: GOOGLE INC.".to_string(),
                    "Free format text: ASSIGNMENT".to_string()
                ],
            }]
        );
    }

    #[test]
    fn test_classifications_deduplicated() {
        let mut fields = ExtractedFields::new();
        fields.insert(
            Field::Classifications,
            FieldValue::Table(vec![
                record(&[("code", &["G06F3/0237"]), ("first", &["false"])]),
                record(&[("code", &["G06F3/04883"])]),
                record(&[("code", &["G06F3/0237"]), ("first", &["true"])]),
            ]),
        );

        let doc = normalize(id(), fields).unwrap();
        assert_eq!(
            doc.classifications,
            vec![
                Classification {
                    code: "G06F3/0237".to_string(),
                    first: true
                },
                Classification {
                    code: "G06F3/04883".to_string(),
                    first: false
                },
            ]
        );
    }

    #[test]
    fn test_publication_number_mismatch_warns() {
        let mut fields = ExtractedFields::new();
        fields.insert(Field::PublicationNumber, FieldValue::Text("US8400417B1".to_string()));
        let doc = normalize(id(), fields).unwrap();
        assert_eq!(doc.warnings.len(), 1);

        let mut fields = ExtractedFields::new();
        fields.insert(Field::PublicationNumber, FieldValue::Text(" US8400417B2 ".to_string()));
        let doc = normalize(id(), fields).unwrap();
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn test_claim_details() {
        let mut fields = ExtractedFields::new();
        fields.insert(
            Field::ClaimDetails,
            FieldValue::Table(vec![
                record(&[("number", &["00001"]), ("refs", &[])]),
                record(&[("number", &["00002"]), ("refs", &["CLM-00001", "CLM-00001"])]),
                record(&[("number", &["x"]), ("refs", &["CLM-00001", "CLM-00002"])]),
            ]),
        );

        let doc = normalize(id(), fields).unwrap();
        assert_eq!(
            doc.claim_details,
            vec![
                ClaimDetail {
                    number: Some(1),
                    depends_on: vec![]
                },
                ClaimDetail {
                    number: Some(2),
                    depends_on: vec![1]
                },
                ClaimDetail {
                    number: None,
                    depends_on: vec![1, 2]
                },
            ]
        );
        assert!(!doc.claim_details[0].is_dependent());
        assert!(doc.claim_details[1].is_dependent());
    }

    #[test]
    fn test_priority_applications_and_events() {
        let mut fields = ExtractedFields::new();
        fields.insert(
            Field::PriorityApplications,
            FieldValue::Table(vec![
                record(&[
                    ("application_number", &["US60/824,769"]),
                    ("us_provisional", &["true"]),
                    ("priority_date", &["2006-09-06"]),
                    ("filing_date", &["2006-09-06"]),
                ]),
                record(&[("title", &[" "])]),
            ]),
        );
        fields.insert(
            Field::Events,
            FieldValue::Table(vec![
                record(&[
                    ("date", &["2026-09-06"]),
                    ("title", &["Anticipated expiration"]),
                    ("type", &["legal-status"]),
                    ("critical", &["Critical"]),
                ]),
                record(&[("date", &["2009-04-13"]), ("title", &["Application filed by Apple Inc"])]),
            ]),
        );

        let doc = normalize(id(), fields).unwrap();
        assert_eq!(
            doc.priority_applications,
            vec![PriorityApplication {
                application_number: Some("US60/824,769".to_string()),
                title: None,
                priority_date: NaiveDate::from_ymd_opt(2006, 9, 6),
                filing_date: NaiveDate::from_ymd_opt(2006, 9, 6),
                us_provisional: true,
            }]
        );
        assert!(doc.priority_claims.is_empty());
        assert_eq!(doc.events.len(), 2);
        assert!(doc.events[0].critical);
        assert_eq!(doc.events[0].kind.as_deref(), Some("legal-status"));
        assert!(!doc.events[1].critical);
    }

    #[test]
    fn test_similar_document_date_is_checked() {
        let mut fields = ExtractedFields::new();
        fields.insert(
            Field::SimilarDocuments,
            FieldValue::Table(vec![record(&[
                ("identifier", &["US7479949B2"]),
                ("publication_date", &["someday"]),
            ])]),
        );

        let err = normalize(id(), fields).unwrap_err();
        assert!(matches!(
            err,
            HarvesterError::DateParse { field, .. } if field == "similar_documents.publication_date"
        ));
    }
}
