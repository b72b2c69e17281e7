//! Field extraction from patent pages.
//!
//! The [`Extractor`] runs a compiled [`Grammar`] over the page markup and
//! records every field the grammar names, explicitly marking the ones the page
//! does not have.

pub mod fields;
pub mod grammar;

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};

pub use fields::{ExtractedFields, Field, FieldValue, Record};
pub use grammar::{CompiledGrammar, Grammar};

use crate::config::HarvesterConfig;
use crate::error::{HarvesterError, Result};
use crate::fetcher::RawPage;
use grammar::{CompiledProbe, CompiledShape};

/// Applies an extraction grammar to fetched pages.
#[derive(Debug, Clone)]
pub struct Extractor {
    grammar: CompiledGrammar,
}

impl Extractor {
    /// Extractor using the built-in grammar.
    pub fn new() -> Result<Self> {
        Self::with_grammar(&Grammar::builtin()?)
    }

    /// Extractor using the grammar file from the config, or the built-in one.
    pub fn from_config(config: &HarvesterConfig) -> Result<Self> {
        match &config.grammar_path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading extraction grammar");
                Self::with_grammar(&Grammar::from_file(path)?)
            }
            None => Self::new(),
        }
    }

    pub fn with_grammar(grammar: &Grammar) -> Result<Self> {
        Ok(Self {
            grammar: grammar.compile()?,
        })
    }

    /// Extract raw field values from a page.
    ///
    /// Fails only when the page has none of the grammar's anchors.
    pub fn extract(&self, page: &RawPage) -> Result<ExtractedFields> {
        let document = Html::parse_document(page.html());
        let root = document.root_element();

        let anchored = self
            .grammar
            .anchors
            .iter()
            .any(|anchor| root.select(anchor).next().is_some());
        if !anchored {
            return Err(HarvesterError::ExtractionFailed(format!(
                "{} does not look like a patent page (no structural anchor found)",
                page.url()
            )));
        }

        let mut fields = ExtractedFields::new();
        for rule in &self.grammar.rules {
            let value = match &rule.shape {
                CompiledShape::Scalar(probes) => scalar(root, probes),
                CompiledShape::List { probes, container } => {
                    list(root, probes, container.as_ref())
                }
                CompiledShape::Table { rows, cells } => table(root, rows, cells),
            };
            if value.is_missing() {
                tracing::debug!(field = %rule.field, url = page.url(), "Field not present on page");
            }
            fields.insert(rule.field, value);
        }

        Ok(fields)
    }
}

/// Raw text of an element: all descendant text nodes concatenated.
fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn read(element: ElementRef<'_>, attr: Option<&str>) -> Option<String> {
    match attr {
        Some(name) => element.value().attr(name).map(str::to_string),
        None => Some(element_text(element)),
    }
}

/// Values of every element a probe matches under `scope`, in document order.
fn probe_values(scope: ElementRef<'_>, probe: &CompiledProbe) -> Vec<String> {
    let attr = probe.attr.as_deref();
    let Some(selector) = &probe.selector else {
        return read(scope, attr).into_iter().collect();
    };
    let matched: Vec<ElementRef<'_>> = scope.select(selector).collect();
    let kept = if probe.outermost {
        outermost(matched)
    } else {
        matched
    };
    kept.into_iter()
        .filter_map(|element| read(element, attr))
        .collect()
}

/// Drop elements that have an ancestor in the same set.
fn outermost(elements: Vec<ElementRef<'_>>) -> Vec<ElementRef<'_>> {
    let ids: HashSet<_> = elements.iter().map(|element| element.id()).collect();
    elements
        .into_iter()
        .filter(|element| !element.ancestors().any(|node| ids.contains(&node.id())))
        .collect()
}

/// Values from the first probe that yields any.
fn first_probe_values(scope: ElementRef<'_>, probes: &[CompiledProbe]) -> Option<Vec<String>> {
    probes
        .iter()
        .map(|probe| probe_values(scope, probe))
        .find(|values| !values.is_empty())
}

fn scalar(root: ElementRef<'_>, probes: &[CompiledProbe]) -> FieldValue {
    first_probe_values(root, probes)
        .and_then(|values| values.into_iter().next())
        .map_or(FieldValue::Missing, FieldValue::Text)
}

fn list(root: ElementRef<'_>, probes: &[CompiledProbe], container: Option<&Selector>) -> FieldValue {
    if let Some(values) = first_probe_values(root, probes) {
        return FieldValue::List(values);
    }
    match container {
        Some(selector) if root.select(selector).next().is_some() => FieldValue::List(Vec::new()),
        _ => FieldValue::Missing,
    }
}

fn table(root: ElementRef<'_>, rows: &[Selector], cells: &[(String, CompiledProbe)]) -> FieldValue {
    let Some(matched) = rows
        .iter()
        .map(|selector| root.select(selector).collect::<Vec<_>>())
        .find(|matched| !matched.is_empty())
    else {
        return FieldValue::Missing;
    };

    let records = matched
        .into_iter()
        .map(|row| {
            let mut record = Record::default();
            for (name, probe) in cells {
                record.insert(name.clone(), probe_values(row, probe));
            }
            record
        })
        .collect();

    FieldValue::Table(records)
}
