// NaijaVerify Core Services

pub mod text_processor;
pub mod config_store;
pub mod providers;
pub mod catalog;
pub mod result_store;
pub mod detection;

pub use text_processor::*;
pub use config_store::*;
pub use providers::*;
pub use catalog::{Catalog, CatalogError, PatternRecord, SourceRecord};
pub use result_store::{FileStore, MemoryStore, ResultStore};

pub use detection::{
    check_source_credibility,
    check_source_credibility_with,
    score_text,
    score_text_with,
    LlmAnalyzer,
    MockGenerator,
};
