// Pattern Scorer
// Scores free text against the weighted misinformation phrase table

use crate::models::{Indicator, TextAnalysisResult};
use crate::services::catalog::{Catalog, PatternRecord};
use crate::services::text_processor::normalize_punctuation;

/// Each unit of accumulated weight costs this many points.
const WEIGHT_PENALTY: f64 = 50.0;

/// Score text with the embedded catalog.
pub fn score_text(text: &str) -> TextAnalysisResult {
    score_text_with(&Catalog::builtin(), text)
}

pub fn score_text_with(catalog: &Catalog, text: &str) -> TextAnalysisResult {
    score_patterns(&catalog.patterns, &normalize_punctuation(text))
}

/// Accumulate weights of every matching pattern; `100 - weight * 50`, clamped.
pub fn score_patterns(patterns: &[PatternRecord], text: &str) -> TextAnalysisResult {
    let mut total_weight = 0.0;
    let mut indicators = Vec::new();

    for record in patterns {
        if record.is_match(text) {
            total_weight += record.weight;
            indicators.push(Indicator {
                pattern: record.pattern.clone(),
                severity: record.weight * 10.0,
            });
        }
    }

    let score = (100.0 - total_weight * WEIGHT_PENALTY).round().clamp(0.0, 100.0) as u8;

    TextAnalysisResult { score, indicators }
}
