// Detection Module
// Authenticity heuristics organized into specialized submodules:
// - pattern_scorer: weighted phrase matching on free text
// - source_checker: host lookup against the credible outlet table
// - mock_generator: reproducible demo analysis records
// - llm_analyzer: completion-model fact checks with a canned fallback

pub mod pattern_scorer;
pub mod source_checker;
pub mod mock_generator;
pub mod llm_analyzer;

pub use pattern_scorer::{score_patterns, score_text, score_text_with};
pub use source_checker::{check_source_credibility, check_source_credibility_with, extract_host};
pub use mock_generator::{derive_seed, MockGenerator, SeededRandom};
pub use llm_analyzer::{
    build_text_prompt,
    build_url_prompt,
    extract_json,
    text_fallback,
    url_fallback,
    LlmAnalyzer,
};
