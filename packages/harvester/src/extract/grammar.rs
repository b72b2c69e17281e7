//! Declarative extraction grammar.
//!
//! Selectors live in YAML so that a site redesign is fixed by editing data.
//! The built-in grammar is `grammar.yaml` next to this file.

use std::collections::BTreeMap;
use std::path::Path;

use scraper::Selector;
use serde::{Deserialize, Serialize};

use super::fields::Field;
use crate::error::{HarvesterError, Result};

/// The grammar shipped with the crate.
pub const DEFAULT_GRAMMAR: &str = include_str!("grammar.yaml");

/// Where a probe reads its value from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    /// CSS selector; absent means the context element itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Attribute to read; absent means the element's text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
    /// Drop matches that sit inside another match, so a selector list can
    /// name both a block and the elements it may contain.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub outermost: bool,
}

/// Shape of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// First match.
    Scalar,
    /// All matches in document order.
    List,
    /// One record per row with named cells.
    Table,
}

/// How to find one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: Field,
    pub kind: RuleKind,
    /// Alternatives for scalar and list fields, tried in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub probes: Vec<Probe>,
    /// For list fields: when this matches but no probe does, the field is an
    /// empty list rather than missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// Row selector alternatives for table fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<String>,
    /// Cell probes for table fields, evaluated inside each row.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cells: BTreeMap<String, Probe>,
}

/// The full extraction grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grammar {
    /// A page is a patent page when any of these match.
    pub anchors: Vec<String>,
    pub fields: Vec<FieldRule>,
}

impl Grammar {
    /// Parse a grammar from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| HarvesterError::Grammar(e.to_string()))
    }

    /// Load a grammar file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            HarvesterError::Grammar(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&yaml)
    }

    /// The built-in grammar.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(DEFAULT_GRAMMAR)
    }

    /// Rule for a field, if the grammar has one.
    #[must_use]
    pub fn rule(&self, field: Field) -> Option<&FieldRule> {
        self.fields.iter().find(|rule| rule.field == field)
    }

    /// Parse every selector and check each rule has what its kind needs.
    pub fn compile(&self) -> Result<CompiledGrammar> {
        if self.anchors.is_empty() {
            return Err(HarvesterError::Grammar("no anchors defined".to_string()));
        }
        let anchors = self
            .anchors
            .iter()
            .map(|s| parse_selector(s, "anchor"))
            .collect::<Result<Vec<_>>>()?;

        let mut rules = Vec::with_capacity(self.fields.len());
        for rule in &self.fields {
            rules.push(compile_rule(rule)?);
        }

        Ok(CompiledGrammar { anchors, rules })
    }
}

fn parse_selector(selector: &str, context: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| HarvesterError::Grammar(format!("bad selector '{selector}' in {context}: {e}")))
}

fn compile_probe(probe: &Probe, context: &str, require_selector: bool) -> Result<CompiledProbe> {
    let selector = match &probe.selector {
        Some(s) => Some(parse_selector(s, context)?),
        None if require_selector => {
            return Err(HarvesterError::Grammar(format!(
                "probe without selector in {context}"
            )));
        }
        None => None,
    };
    Ok(CompiledProbe {
        selector,
        attr: probe.attr.clone(),
        outermost: probe.outermost,
    })
}

fn compile_rule(rule: &FieldRule) -> Result<CompiledRule> {
    let context = rule.field.as_str();
    let shape = match rule.kind {
        RuleKind::Scalar | RuleKind::List => {
            if rule.probes.is_empty() {
                return Err(HarvesterError::Grammar(format!("{context}: no probes")));
            }
            let probes = rule
                .probes
                .iter()
                .map(|p| compile_probe(p, context, true))
                .collect::<Result<Vec<_>>>()?;
            if rule.kind == RuleKind::Scalar {
                CompiledShape::Scalar(probes)
            } else {
                let container = rule
                    .container
                    .as_deref()
                    .map(|s| parse_selector(s, context))
                    .transpose()?;
                CompiledShape::List { probes, container }
            }
        }
        RuleKind::Table => {
            if rule.rows.is_empty() || rule.cells.is_empty() {
                return Err(HarvesterError::Grammar(format!(
                    "{context}: tables need rows and cells"
                )));
            }
            let rows = rule
                .rows
                .iter()
                .map(|s| parse_selector(s, context))
                .collect::<Result<Vec<_>>>()?;
            let cells = rule
                .cells
                .iter()
                .map(|(name, probe)| Ok((name.clone(), compile_probe(probe, context, false)?)))
                .collect::<Result<Vec<_>>>()?;
            CompiledShape::Table { rows, cells }
        }
    };
    Ok(CompiledRule {
        field: rule.field,
        shape,
    })
}

/// A probe with its selector parsed.
#[derive(Debug, Clone)]
pub struct CompiledProbe {
    pub selector: Option<Selector>,
    pub attr: Option<String>,
    pub outermost: bool,
}

#[derive(Debug, Clone)]
pub enum CompiledShape {
    Scalar(Vec<CompiledProbe>),
    List {
        probes: Vec<CompiledProbe>,
        container: Option<Selector>,
    },
    Table {
        rows: Vec<Selector>,
        cells: Vec<(String, CompiledProbe)>,
    },
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub field: Field,
    pub shape: CompiledShape,
}

/// A grammar ready to run against documents.
#[derive(Debug, Clone)]
pub struct CompiledGrammar {
    pub anchors: Vec<Selector>,
    pub rules: Vec<CompiledRule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_grammar_compiles() {
        let grammar = Grammar::builtin().unwrap();
        let compiled = grammar.compile().unwrap();
        assert_eq!(compiled.rules.len(), grammar.fields.len());
        assert!(!compiled.anchors.is_empty());
    }

    #[test]
    fn test_builtin_grammar_covers_record_fields() {
        let grammar = Grammar::builtin().unwrap();
        for field in [
            Field::Title,
            Field::Abstract,
            Field::Claims,
            Field::Description,
            Field::Inventors,
            Field::Assignee,
            Field::PriorityDate,
            Field::PublicationDate,
            Field::FilingDate,
            Field::ApplicationNumber,
            Field::Citations,
            Field::LegalEvents,
            Field::ClaimDetails,
            Field::PriorityClaims,
            Field::PriorityApplications,
            Field::Events,
            Field::SimilarDocuments,
            Field::Relations,
        ] {
            assert!(grammar.rule(field).is_some(), "no rule for {field}");
        }
        assert_eq!(grammar.rule(Field::Claims).unwrap().kind, RuleKind::List);
        assert_eq!(grammar.rule(Field::Citations).unwrap().kind, RuleKind::Table);
        assert!(grammar.rule(Field::Description).unwrap().probes[0].outermost);
    }

    #[test]
    fn test_bad_selector_is_rejected() {
        let yaml = r#"
anchors: ["article"]
fields:
  - field: title
    kind: scalar
    probes:
      - { selector: "meta[[[" }
"#;
        let grammar = Grammar::from_yaml(yaml).unwrap();
        assert!(matches!(grammar.compile(), Err(HarvesterError::Grammar(_))));
    }

    #[test]
    fn test_table_without_cells_is_rejected() {
        let yaml = r#"
anchors: ["article"]
fields:
  - field: citations
    kind: table
    rows: ["tr"]
"#;
        let grammar = Grammar::from_yaml(yaml).unwrap();
        assert!(matches!(grammar.compile(), Err(HarvesterError::Grammar(_))));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let yaml = r#"
anchors: ["article"]
fields:
  - field: colour
    kind: scalar
    probes: [{ selector: "span" }]
"#;
        assert!(matches!(Grammar::from_yaml(yaml), Err(HarvesterError::Grammar(_))));
    }
}
