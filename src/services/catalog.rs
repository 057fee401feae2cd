// Reference Catalog
// Immutable lookup tables: misinformation patterns, credible sources and the
// canned material used by the mock generator. Loaded once at startup.

use crate::models::Finding;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Invalid catalog: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    #[serde(default)]
    region: String,
    patterns: Vec<PatternEntry>,
    sources: Vec<SourceRecord>,
    #[serde(default)]
    recommended_alternatives: Vec<String>,
    mock: MockTables,
}

#[derive(Debug, Deserialize)]
struct PatternEntry {
    pattern: String,
    weight: f64,
}

/// Known outlet with a fixed reliability weight in [0,1].
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRecord {
    pub domain: String,
    pub name: String,
    pub reliability: f64,
}

#[derive(Debug, Clone)]
pub struct PatternRecord {
    pub pattern: String,
    pub weight: f64,
    regex: Regex,
}

impl PatternRecord {
    pub fn new(pattern: &str, weight: f64) -> Result<Self, CatalogError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| CatalogError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            pattern: pattern.to_string(),
            weight,
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Canned candidates for the mock generator.
///
/// The three dimension lists are ordered issue, warning, positive.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockTables {
    pub titles: Vec<String>,
    pub source_labels: Vec<String>,
    pub related_facts: Vec<String>,
    pub manipulation_findings: Vec<Finding>,
    pub source_findings: Vec<Finding>,
    pub context_findings: Vec<Finding>,
    pub bonus_findings: Vec<Finding>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    pub region: String,
    pub patterns: Vec<PatternRecord>,
    pub sources: Vec<SourceRecord>,
    pub recommended_alternatives: Vec<String>,
    pub mock: MockTables,
}

static BUILTIN: OnceLock<Arc<Catalog>> = OnceLock::new();

impl Catalog {
    /// The catalog embedded in the binary.
    pub fn builtin() -> Arc<Catalog> {
        BUILTIN
            .get_or_init(|| {
                let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/catalog.json"));
                Arc::new(Catalog::from_json_str(raw).expect("catalog.json parse failed"))
            })
            .clone()
    }

    pub fn from_json_str(raw: &str) -> Result<Catalog, CatalogError> {
        let parsed: CatalogFile = serde_json::from_str(raw)?;

        let patterns = parsed
            .patterns
            .iter()
            .map(|p| PatternRecord::new(&p.pattern, p.weight))
            .collect::<Result<Vec<_>, _>>()?;

        let catalog = Catalog {
            region: parsed.region,
            patterns,
            sources: parsed
                .sources
                .into_iter()
                .map(|mut s| {
                    s.domain = s.domain.trim().to_ascii_lowercase();
                    s
                })
                .collect(),
            recommended_alternatives: parsed.recommended_alternatives,
            mock: parsed.mock,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_file(path: &Path) -> Result<Catalog, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Load a catalog from `path` when given, otherwise use the embedded one.
    pub fn load(path: Option<&Path>) -> Result<Arc<Catalog>, CatalogError> {
        match path {
            Some(p) => Ok(Arc::new(Self::from_file(p)?)),
            None => Ok(Self::builtin()),
        }
    }

    fn validate(&self) -> Result<(), CatalogError> {
        for p in &self.patterns {
            if !(0.0..=1.0).contains(&p.weight) {
                return Err(CatalogError::Invalid(format!(
                    "pattern '{}' weight {} outside [0,1]",
                    p.pattern, p.weight
                )));
            }
        }
        for s in &self.sources {
            if s.domain.is_empty() {
                return Err(CatalogError::Invalid("source with empty domain".to_string()));
            }
            if !(0.0..=1.0).contains(&s.reliability) {
                return Err(CatalogError::Invalid(format!(
                    "source '{}' reliability {} outside [0,1]",
                    s.domain, s.reliability
                )));
            }
        }

        let mock = &self.mock;
        if mock.titles.is_empty() || mock.source_labels.is_empty() || mock.bonus_findings.is_empty() {
            return Err(CatalogError::Invalid(
                "mock titles, source labels and bonus findings must not be empty".to_string(),
            ));
        }
        // Up to five facts are drawn without replacement.
        if mock.related_facts.len() < 5 {
            return Err(CatalogError::Invalid(format!(
                "need at least 5 related facts, got {}",
                mock.related_facts.len()
            )));
        }
        for (name, list) in [
            ("manipulationFindings", &mock.manipulation_findings),
            ("sourceFindings", &mock.source_findings),
            ("contextFindings", &mock.context_findings),
        ] {
            if list.len() != 3 {
                return Err(CatalogError::Invalid(format!(
                    "{} must hold exactly 3 entries (issue, warning, positive)",
                    name
                )));
            }
        }
        Ok(())
    }
}
