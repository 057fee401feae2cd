// Mock Result Generator
// Fabricates a reproducible AnalysisResult from an analysis identifier.
//
// Every value, including the bonus finding, comes from one seeded stream.
// The draws happen in a fixed order: the three sub-scores, the related facts,
// content type, title, source label and finally the bonus finding.

use crate::models::{AnalysisResult, ContentType, Finding};
use crate::services::catalog::Catalog;
use tracing::debug;

const LCG_MULTIPLIER: u64 = 9301;
const LCG_INCREMENT: u64 = 49297;
const LCG_MODULUS: u64 = 233280;

/// Digits kept from the end of the identifier.
const SEED_DIGITS: usize = 6;
/// Seed for identifiers that carry no digits at all.
const FALLBACK_SEED: u64 = 1;

const LOW_CUT: u8 = 40;
const HIGH_CUT: u8 = 70;

/// Linear congruential generator yielding values in [0,1).
#[derive(Debug, Clone)]
pub struct SeededRandom {
    state: u64,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self { state: seed % LCG_MODULUS }
    }

    pub fn from_id(id: &str) -> Self {
        Self::new(derive_seed(id))
    }

    pub fn next_f64(&mut self) -> f64 {
        self.state = (self.state * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS;
        self.state as f64 / LCG_MODULUS as f64
    }

    /// Index into a collection of `len` items; `len` must be non-zero.
    pub fn next_index(&mut self, len: usize) -> usize {
        ((self.next_f64() * len as f64).floor() as usize).min(len.saturating_sub(1))
    }

    fn next_score(&mut self) -> u8 {
        (self.next_f64() * 100.0).floor() as u8
    }
}

/// Trailing six digits of the identifier, or [`FALLBACK_SEED`] when it has none.
pub fn derive_seed(id: &str) -> u64 {
    let digits: Vec<char> = id.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return FALLBACK_SEED;
    }
    let tail: String = digits[digits.len().saturating_sub(SEED_DIGITS)..].iter().collect();
    tail.parse().unwrap_or(FALLBACK_SEED)
}

pub struct MockGenerator<'a> {
    catalog: &'a Catalog,
}

impl<'a> MockGenerator<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn generate(&self, id: &str) -> AnalysisResult {
        let mut random = SeededRandom::from_id(id);
        let mock = &self.catalog.mock;

        let manipulation_score = random.next_score();
        let source_reliability_score = random.next_score();
        let context_accuracy_score = random.next_score();
        let score = overall_score(manipulation_score, source_reliability_score, context_accuracy_score);

        let related_facts = pick_related_facts(&mut random, &mock.related_facts);
        let content_type = ContentType::ALL[random.next_index(ContentType::ALL.len())];
        let title = mock.titles[random.next_index(mock.titles.len())].clone();
        let source = mock.source_labels[random.next_index(mock.source_labels.len())].clone();

        let mut findings = vec![
            by_threshold(&mock.manipulation_findings, manipulation_score),
            by_threshold(&mock.source_findings, source_reliability_score),
            by_threshold(&mock.context_findings, context_accuracy_score),
        ];
        findings.push(mock.bonus_findings[random.next_index(mock.bonus_findings.len())].clone());

        let explanation = explain(score, manipulation_score, source_reliability_score, context_accuracy_score);

        debug!(
            id,
            score,
            manipulation_score,
            source_reliability_score,
            context_accuracy_score,
            "mock.generated"
        );

        AnalysisResult {
            id: id.to_string(),
            content_type,
            title,
            source,
            score,
            manipulation_score,
            source_reliability_score,
            context_accuracy_score,
            findings,
            explanation,
            related_facts: Some(related_facts),
        }
    }
}

/// Weighted blend 0.4 / 0.4 / 0.2, floored.
pub fn overall_score(manipulation: u8, source_reliability: u8, context_accuracy: u8) -> u8 {
    let blended = manipulation as f64 * 0.4 + source_reliability as f64 * 0.4 + context_accuracy as f64 * 0.2;
    blended.floor().clamp(0.0, 100.0) as u8
}

/// Lists are ordered issue, warning, positive.
fn by_threshold(options: &[Finding], score: u8) -> Finding {
    let idx = if score < LOW_CUT {
        0
    } else if score < HIGH_CUT {
        1
    } else {
        2
    };
    options[idx].clone()
}

/// Three to five facts, drawn without replacement.
fn pick_related_facts(random: &mut SeededRandom, pool: &[String]) -> Vec<String> {
    let mut remaining: Vec<&String> = pool.iter().collect();
    let count = (3 + random.next_index(3)).min(remaining.len());

    let mut facts = Vec::with_capacity(count);
    for _ in 0..count {
        let idx = random.next_index(remaining.len());
        facts.push(remaining.remove(idx).clone());
    }
    facts
}

pub fn explain(score: u8, manipulation: u8, source_reliability: u8, context_accuracy: u8) -> String {
    let mut out = String::new();

    if score < 40 {
        out.push_str("Our analysis indicates this content has significant credibility issues. ");
        if manipulation < 50 {
            out.push_str("There are signs of digital manipulation in the media. ");
        }
        if source_reliability < 50 {
            out.push_str("The source does not appear to be a verified Nigerian news outlet. ");
        }
        if context_accuracy < 50 {
            out.push_str("The context appears to be misleading or inaccurate. ");
        }
        out.push_str(
            "We recommend seeking information from verified Nigerian news sources before sharing this content.",
        );
    } else if score < 70 {
        out.push_str("Our analysis shows this content has some reliability concerns. ");
        if manipulation < 70 {
            out.push_str("There may be some alterations to the original media. ");
        }
        if source_reliability < 70 {
            out.push_str("The source has limited verification or mixed reliability. ");
        }
        if context_accuracy < 70 {
            out.push_str("Some contextual information may be missing or misleading. ");
        }
        out.push_str("We recommend cross-checking with other reliable Nigerian news sources.");
    } else {
        out.push_str("Our analysis indicates this content appears to be authentic. ");
        if manipulation >= 70 {
            out.push_str("No significant manipulation of the media was detected. ");
        }
        if source_reliability >= 70 {
            out.push_str("The source is generally considered reliable. ");
        }
        if context_accuracy >= 70 {
            out.push_str("The context appears to be accurate and appropriate. ");
        }
        out.push_str(
            "While no detection system is perfect, this content shows strong indicators of reliability.",
        );
    }

    out
}
