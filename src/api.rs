// Analysis API
// Submission actions: validation, local heuristics, the LLM adapter and the
// result store wired together. Every entry point returns a Result so callers
// never see a panic or a raw transport error.

use crate::models::{
    ActionResult, AiOutcome, AnalysisResult, ContentType, SourceCredibilityResult, StoredAnalysis,
    Submission, SubmissionReceipt, TextActionResult, TextAnalysisResult, UrlActionResult,
};
use crate::services::catalog::Catalog;
use crate::services::config_store::{AppConfig, ConfigStore};
use crate::services::detection::{
    check_source_credibility_with, score_text_with, LlmAnalyzer, MockGenerator,
};
use crate::services::providers::ConfiguredProvider;
use crate::services::result_store::ResultStore;
use crate::services::text_processor::{char_len, preview};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// Shortest text worth sending for analysis, in characters.
pub const MIN_TEXT_CHARS: usize = 10;

#[derive(Error, Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind", content = "message")]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Analysis for {0} content is not yet supported")]
    Unsupported(ContentType),
    #[error("Analysis results not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// `{success, result}` or `{success, error}` envelope for JSON output.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> From<Result<T, ApiError>> for ApiResponse<T> {
    fn from(value: Result<T, ApiError>) -> Self {
        match value {
            Ok(result) => Self {
                success: true,
                result: Some(result),
                error: None,
            },
            Err(error) => Self {
                success: false,
                result: None,
                error: Some(error),
            },
        }
    }
}

pub struct AnalysisService {
    catalog: Arc<Catalog>,
    analyzer: LlmAnalyzer,
    store: Arc<dyn ResultStore>,
}

impl AnalysisService {
    pub fn new(catalog: Arc<Catalog>, analyzer: LlmAnalyzer, store: Arc<dyn ResultStore>) -> Self {
        Self {
            catalog,
            analyzer,
            store,
        }
    }

    /// Build the service from config: catalog, provider and LLM settings.
    pub fn from_config(
        config: &AppConfig,
        config_store: Option<&ConfigStore>,
        store: Arc<dyn ResultStore>,
    ) -> anyhow::Result<Self> {
        let catalog = Catalog::load(config.catalog_path.as_ref().map(PathBuf::from).as_deref())?;
        info!(
            "[API] catalog region={} patterns={} sources={}",
            catalog.region,
            catalog.patterns.len(),
            catalog.sources.len()
        );

        let provider = ConfiguredProvider::from_config(config, config_store)?;
        if !provider.is_enabled() {
            warn!(
                "Provider '{}' is disabled; AI analysis will fall back",
                provider.spec().name
            );
        } else if !provider.has_api_key() {
            warn!(
                "No API key for provider '{}'; AI analysis will fall back",
                provider.spec().name
            );
        }
        let analyzer = LlmAnalyzer::new(
            Arc::new(provider),
            config.llm.clone(),
            catalog.recommended_alternatives.clone(),
        );
        Ok(Self::new(catalog, analyzer, store))
    }

    /// Pattern scoring only, no network.
    pub fn score_text(&self, text: &str) -> TextAnalysisResult {
        score_text_with(&self.catalog, text)
    }

    /// Source table lookup only, no network.
    pub fn check_source(&self, url: &str) -> SourceCredibilityResult {
        check_source_credibility_with(&self.catalog, url, &mut rand::thread_rng())
    }

    pub async fn analyze_text(&self, text: &str) -> Result<TextActionResult, ApiError> {
        self.analyze_text_until(text, std::future::pending()).await
    }

    pub async fn analyze_text_until<F>(&self, text: &str, cancel: F) -> Result<TextActionResult, ApiError>
    where
        F: Future<Output = ()>,
    {
        let text = text.trim();
        if char_len(text) < MIN_TEXT_CHARS {
            return Err(ApiError::Validation("Text is too short for analysis".to_string()));
        }

        info!("[API] analyze_text chars={} preview={:?}", char_len(text), preview(text, 60));

        let basic_analysis = self.score_text(text);
        let ai_analysis = self.analyzer.analyze_text_until(text, cancel).await;

        let ai = ai_analysis.analysis();
        // A fallback carries a neutral placeholder score; prefer the local one then.
        let score = match &ai_analysis {
            AiOutcome::Parsed { analysis } => analysis.credibility_score,
            AiOutcome::Fallback { .. } => basic_analysis.score,
        };

        Ok(TextActionResult {
            score,
            findings: ai.issues.clone(),
            explanation: ai.explanation.clone(),
            manipulation_techniques: ai.manipulation_techniques.clone(),
            suggested_verification_steps: ai.suggested_verification_steps.clone(),
            basic_analysis,
            ai_analysis,
        })
    }

    pub async fn analyze_url(&self, url: &str) -> Result<UrlActionResult, ApiError> {
        self.analyze_url_until(url, std::future::pending()).await
    }

    pub async fn analyze_url_until<F>(&self, url: &str, cancel: F) -> Result<UrlActionResult, ApiError>
    where
        F: Future<Output = ()>,
    {
        let url = validate_url(url)?;

        info!("[API] analyze_url url={}", url);

        let basic_analysis = self.check_source(&url);
        let ai_analysis = self.analyzer.analyze_url_until(&url, cancel).await;

        let ai = ai_analysis.analysis();
        let (score, credible) = match &ai_analysis {
            AiOutcome::Parsed { analysis } => (analysis.reliability_score, analysis.is_credible_source),
            AiOutcome::Fallback { .. } => (basic_analysis.reliability_score, basic_analysis.is_credible),
        };

        let explanation = format!(
            "This URL was analyzed for credibility. {}",
            if credible {
                "It appears to be a credible source."
            } else {
                "It may not be a reliable source."
            }
        );

        Ok(UrlActionResult {
            score,
            findings: ai.issues.clone(),
            explanation,
            recommended_alternatives: ai.recommended_alternatives.clone(),
            basic_analysis,
            ai_analysis,
        })
    }

    /// Analyze a submission and store the result under a fresh id.
    pub async fn submit(&self, submission: Submission) -> Result<SubmissionReceipt, ApiError> {
        self.submit_until(submission, std::future::pending()).await
    }

    pub async fn submit_until<F>(&self, submission: Submission, cancel: F) -> Result<SubmissionReceipt, ApiError>
    where
        F: Future<Output = ()>,
    {
        let content_type = submission.content_type;

        if content_type.is_file_based() {
            let file = submission
                .file
                .as_ref()
                .ok_or_else(|| ApiError::Validation("No file selected".to_string()))?;
            warn!(
                "[API] {} submission '{}' rejected: file analysis unsupported",
                content_type, file.name
            );
            return Err(ApiError::Unsupported(content_type));
        }

        let content = submission
            .content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ApiError::Validation("No content provided".to_string()))?;

        let result = match content_type {
            ContentType::Text => ActionResult::Text(self.analyze_text_until(content, cancel).await?),
            ContentType::Url => ActionResult::Url(self.analyze_url_until(content, cancel).await?),
            ContentType::Image | ContentType::Video => return Err(ApiError::Unsupported(content_type)),
        };

        let now = chrono::Utc::now();
        let mut stored = StoredAnalysis {
            id: String::new(),
            content_type,
            content: content.to_string(),
            created_at: now.to_rfc3339(),
            result: result.clone(),
        };

        // `analysis_<unix millis>`, bumped until the store accepts it as new.
        let mut millis = now.timestamp_millis();
        let id = loop {
            let id = format!("analysis_{}", millis);
            stored.id = id.clone();
            if self.store.insert_new(&id, &stored).map_err(ApiError::Storage)? {
                break id;
            }
            millis += 1;
        };

        info!("[API] stored {} type={} score={}", id, content_type, result.score());

        Ok(SubmissionReceipt { id, result })
    }

    pub fn get_results(&self, id: &str) -> Result<StoredAnalysis, ApiError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ApiError::Validation("No analysis ID provided".to_string()));
        }
        self.store
            .get(id)
            .map_err(ApiError::Storage)?
            .ok_or_else(|| ApiError::NotFound(id.to_string()))
    }

    pub fn list_results(&self) -> Result<Vec<String>, ApiError> {
        self.store.keys().map_err(ApiError::Storage)
    }

    /// Demo record derived from the id alone.
    pub fn mock_results(&self, id: &str) -> AnalysisResult {
        MockGenerator::new(&self.catalog).generate(id)
    }
}

/// Absolute http(s) URL with a host, normalized to its serialized form.
pub fn validate_url(raw: &str) -> Result<String, ApiError> {
    let invalid = || ApiError::Validation("Invalid URL".to_string());
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(invalid());
    }
    let parsed = Url::parse(raw).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }
    Ok(parsed.to_string())
}
