// LLM Analyzer
// Asks a completion model to fact-check text or a URL and parses its JSON
// answer. Every path ends in either a parsed analysis or the canned fallback.

use crate::models::{AiOutcome, FallbackReason, Finding, TextAiAnalysis, UrlAiAnalysis};
use crate::services::config_store::LlmConfig;
use crate::services::providers::{CompletionRequest, CompletionService, ProviderError};
use crate::services::text_processor::preview;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const FALLBACK_SCORE: u8 = 50;

pub struct LlmAnalyzer {
    service: Arc<dyn CompletionService>,
    settings: LlmConfig,
    recommended_alternatives: Vec<String>,
}

impl LlmAnalyzer {
    pub fn new(
        service: Arc<dyn CompletionService>,
        settings: LlmConfig,
        recommended_alternatives: Vec<String>,
    ) -> Self {
        Self {
            service,
            settings,
            recommended_alternatives,
        }
    }

    pub async fn analyze_text(&self, text: &str) -> AiOutcome<TextAiAnalysis> {
        self.analyze_text_until(text, std::future::pending()).await
    }

    /// Like [`analyze_text`](Self::analyze_text), but resolves to the
    /// cancelled fallback as soon as `cancel` completes.
    pub async fn analyze_text_until<F>(&self, text: &str, cancel: F) -> AiOutcome<TextAiAnalysis>
    where
        F: Future<Output = ()>,
    {
        let request = CompletionRequest {
            prompt: build_text_prompt(text),
            temperature: self.settings.temperature,
            max_tokens: self.settings.text_max_tokens,
        };
        self.run(request, cancel, text_fallback).await
    }

    pub async fn analyze_url(&self, url: &str) -> AiOutcome<UrlAiAnalysis> {
        self.analyze_url_until(url, std::future::pending()).await
    }

    pub async fn analyze_url_until<F>(&self, url: &str, cancel: F) -> AiOutcome<UrlAiAnalysis>
    where
        F: Future<Output = ()>,
    {
        let request = CompletionRequest {
            prompt: build_url_prompt(url),
            temperature: self.settings.temperature,
            max_tokens: self.settings.url_max_tokens,
        };
        let alternatives = &self.recommended_alternatives;
        self.run(request, cancel, |reason| url_fallback(reason, alternatives))
            .await
    }

    async fn run<T, F, B>(&self, request: CompletionRequest, cancel: F, fallback: B) -> AiOutcome<T>
    where
        T: DeserializeOwned,
        F: Future<Output = ()>,
        B: Fn(&FallbackReason) -> T,
    {
        let started = Instant::now();
        tokio::pin!(cancel);

        let completion = tokio::select! {
            biased;
            _ = &mut cancel => Err(FallbackReason::Cancelled),
            res = self.complete_with_retry(&request) => res,
        };

        let reason = match completion {
            Ok(content) => match extract_json::<T>(&content) {
                Some(analysis) => {
                    info!(
                        "[LLM_ANALYZER] parsed response service={} elapsed_ms={}",
                        self.service.describe(),
                        started.elapsed().as_millis()
                    );
                    return AiOutcome::Parsed { analysis };
                }
                None => {
                    warn!(
                        "[LLM_ANALYZER] unparseable response service={} preview={:?}",
                        self.service.describe(),
                        preview(&content, 120)
                    );
                    FallbackReason::InvalidResponse
                }
            },
            Err(reason) => reason,
        };

        warn!(
            "[LLM_ANALYZER] falling back service={} reason={:?} elapsed_ms={}",
            self.service.describe(),
            reason,
            started.elapsed().as_millis()
        );
        let analysis = fallback(&reason);
        AiOutcome::Fallback { reason, analysis }
    }

    /// Up to `max_attempts` requests, each bounded by the configured timeout,
    /// with linear backoff between attempts. Non-transient provider errors
    /// (missing key, unknown provider, most 4xx) are not retried.
    async fn complete_with_retry(&self, request: &CompletionRequest) -> Result<String, FallbackReason> {
        let attempts = self.settings.attempts();
        let timeout_duration = self.settings.timeout();
        let mut last_err = FallbackReason::ServiceError("no attempt made".to_string());

        for attempt in 1..=attempts {
            match tokio::time::timeout(timeout_duration, self.service.complete(request)).await {
                Ok(Ok(result)) => {
                    info!(
                        "[LLM_ANALYZER] completion ok service={} attempt={} latency_ms={}",
                        self.service.describe(),
                        attempt,
                        result.latency_ms
                    );
                    return Ok(result.content);
                }
                Ok(Err(ProviderError::MissingApiKey)) => {
                    warn!(
                        "[LLM_ANALYZER] API key not configured for {}",
                        self.service.describe()
                    );
                    return Err(FallbackReason::MissingApiKey);
                }
                Ok(Err(e)) if !e.is_transient() => {
                    warn!(
                        "[LLM_ANALYZER] non-retryable error service={} attempt={} : {}",
                        self.service.describe(),
                        attempt,
                        e
                    );
                    return Err(FallbackReason::ServiceError(e.to_string()));
                }
                Ok(Err(e)) => {
                    warn!(
                        "[LLM_ANALYZER] completion error service={} attempt={} : {}",
                        self.service.describe(),
                        attempt,
                        e
                    );
                    last_err = FallbackReason::ServiceError(e.to_string());
                }
                Err(_) => {
                    warn!(
                        "[LLM_ANALYZER] completion timeout service={} attempt={} ({}s)",
                        self.service.describe(),
                        attempt,
                        timeout_duration.as_secs()
                    );
                    last_err = FallbackReason::Timeout;
                }
            }

            if attempt < attempts {
                let backoff_ms = self.settings.retry_backoff_ms * attempt as u64;
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }

        Err(last_err)
    }
}

pub fn build_text_prompt(text: &str) -> String {
    format!(
        r#"You are an expert fact-checker specializing in Nigerian news and media. Analyze the following text for potential misinformation or fake news indicators.

Consider these aspects:
1. Sensationalist language or clickbait
2. Lack of sources or vague attribution
3. Emotional manipulation
4. Factual inconsistencies
5. Political bias
6. Outdated information presented as current
7. Common Nigerian fake news patterns

Text to analyze:
"""
{}
"""

IMPORTANT: Respond ONLY with a valid JSON object using the following structure, with no additional text before or after:
{{
  "credibilityScore": number from 0-100 (higher means more credible),
  "issues": [
    {{
      "type": "issue" or "warning" or "positive",
      "title": "brief title",
      "description": "detailed explanation"
    }}
  ],
  "explanation": "overall analysis explanation",
  "manipulationTechniques": ["list", "of", "techniques", "if", "any"],
  "suggestedVerificationSteps": ["list", "of", "steps", "to", "verify"]
}}"#,
        text
    )
}

pub fn build_url_prompt(url: &str) -> String {
    format!(
        r#"You are an expert fact-checker specializing in Nigerian news sources. Analyze the following URL for credibility:

URL: {}

Evaluate:
1. Is this a known Nigerian news source?
2. What is the reputation of this source?
3. Does the URL structure look legitimate?
4. Are there any red flags in the domain name?
5. Is this likely to be a credible source for Nigerian news?

IMPORTANT: Respond ONLY with a valid JSON object using the following structure, with no additional text before or after:
{{
  "isCredibleSource": boolean,
  "sourceName": "name of the source if identified",
  "reliabilityScore": number from 0-100,
  "issues": [
    {{
      "type": "issue" or "warning" or "positive",
      "title": "brief title",
      "description": "detailed explanation"
    }}
  ],
  "recommendedAlternatives": ["list", "of", "more", "reliable", "sources"]
}}"#,
        url
    )
}

fn json_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex"))
}

/// Parse the whole response as JSON; failing that, parse the span from the
/// first `{` to the last `}`.
pub fn extract_json<T: DeserializeOwned>(content: &str) -> Option<T> {
    if let Ok(parsed) = serde_json::from_str::<T>(content.trim()) {
        return Some(parsed);
    }

    let span = json_span_re().find(content)?;
    serde_json::from_str::<T>(span.as_str()).ok()
}

pub fn text_fallback(reason: &FallbackReason) -> TextAiAnalysis {
    if reason.is_service_failure() {
        TextAiAnalysis {
            credibility_score: FALLBACK_SCORE,
            issues: vec![Finding::warning(
                "Analysis Failed",
                "The AI analysis service encountered an error. Please try again later.",
            )],
            explanation: "There was an error connecting to the analysis service. This might be due to high traffic or a temporary service disruption.".to_string(),
            manipulation_techniques: Vec::new(),
            suggested_verification_steps: vec![
                "Try again later".to_string(),
                "Check your internet connection".to_string(),
            ],
        }
    } else {
        TextAiAnalysis {
            credibility_score: FALLBACK_SCORE,
            issues: vec![Finding::warning(
                "Analysis Error",
                "The AI analysis produced an invalid response format. Please try again.",
            )],
            explanation: "There was an error processing this content. The system was unable to properly analyze the text.".to_string(),
            manipulation_techniques: Vec::new(),
            suggested_verification_steps: vec![
                "Try submitting a shorter text".to_string(),
                "Check for special characters that might confuse the analysis".to_string(),
            ],
        }
    }
}

pub fn url_fallback(reason: &FallbackReason, alternatives: &[String]) -> UrlAiAnalysis {
    let issue = if reason.is_service_failure() {
        Finding::warning(
            "Analysis Failed",
            "The AI analysis service encountered an error. Please try again later.",
        )
    } else {
        Finding::warning(
            "Analysis Error",
            "The AI analysis produced an invalid response format. Please try again.",
        )
    };

    UrlAiAnalysis {
        is_credible_source: false,
        source_name: Some("Unknown".to_string()),
        reliability_score: FALLBACK_SCORE,
        issues: vec![issue],
        recommended_alternatives: alternatives.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FindingKind;
    use crate::services::providers::ChatResult;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Reply {
        Text(&'static str),
        Fail,
        Status(u16),
        NoKey,
        Unknown,
        Hang,
    }

    struct ScriptedService {
        replies: Mutex<VecDeque<Reply>>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedService {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedService {
        async fn complete(&self, request: &CompletionRequest) -> Result<ChatResult, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(request.prompt.clone());
            let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Fail);
            match reply {
                Reply::Text(t) => Ok(ChatResult {
                    content: t.to_string(),
                    latency_ms: 1,
                }),
                Reply::Fail => Err(ProviderError::ApiError {
                    status: 503,
                    message: "unavailable".to_string(),
                }),
                Reply::Status(status) => Err(ProviderError::ApiError {
                    status,
                    message: "rejected".to_string(),
                }),
                Reply::NoKey => Err(ProviderError::MissingApiKey),
                Reply::Unknown => Err(ProviderError::UnknownProvider("mystery".to_string())),
                Reply::Hang => {
                    std::future::pending::<()>().await;
                    Err(ProviderError::MissingContent)
                }
            }
        }
    }

    fn analyzer(service: Arc<ScriptedService>, settings: LlmConfig) -> LlmAnalyzer {
        LlmAnalyzer::new(
            service,
            settings,
            vec!["punchng.com".to_string(), "guardian.ng".to_string(), "channelstv.com".to_string()],
        )
    }

    fn fast_settings(max_attempts: usize) -> LlmConfig {
        LlmConfig {
            timeout_secs: 1,
            max_attempts,
            retry_backoff_ms: 1,
            ..LlmConfig::default()
        }
    }

    const TEXT_JSON: &str = r#"{"credibilityScore": 22, "issues": [{"type": "issue", "title": "Clickbait", "description": "Sensational framing"}], "explanation": "Likely false", "manipulationTechniques": ["fear"], "suggestedVerificationSteps": ["Check NCDC"]}"#;

    #[test]
    fn test_extract_json_direct_and_wrapped() {
        let direct: Option<TextAiAnalysis> = extract_json(TEXT_JSON);
        assert_eq!(direct.unwrap().credibility_score, 22);

        let wrapped = format!("Here is the result: {} Thanks!", TEXT_JSON);
        let parsed: TextAiAnalysis = extract_json(&wrapped).unwrap();
        assert_eq!(parsed.credibility_score, 22);
        assert_eq!(parsed.manipulation_techniques, vec!["fear"]);

        let fenced = format!("```json\n{}\n```", TEXT_JSON);
        assert!(extract_json::<TextAiAnalysis>(&fenced).is_some());
    }

    #[test]
    fn test_extract_json_garbage() {
        assert!(extract_json::<TextAiAnalysis>("I cannot help with that.").is_none());
        assert!(extract_json::<TextAiAnalysis>("{ broken json").is_none());
        assert!(extract_json::<TextAiAnalysis>("").is_none());
    }

    #[test]
    fn test_prompts_embed_input() {
        let prompt = build_text_prompt("Fuel price rises in Kano");
        assert!(prompt.contains("\"\"\"\nFuel price rises in Kano\n\"\"\""));
        assert!(prompt.contains("\"credibilityScore\""));

        let prompt = build_url_prompt("https://thecable.ng/x");
        assert!(prompt.contains("URL: https://thecable.ng/x"));
        assert!(prompt.contains("\"recommendedAlternatives\""));
    }

    #[tokio::test]
    async fn test_valid_json_passes_through() {
        let service = ScriptedService::new(vec![Reply::Text(TEXT_JSON)]);
        let outcome = analyzer(service.clone(), fast_settings(1)).analyze_text("some text here").await;

        let expected: TextAiAnalysis = serde_json::from_str(TEXT_JSON).unwrap();
        assert_eq!(outcome, AiOutcome::Parsed { analysis: expected });
        assert_eq!(service.calls(), 1);
        assert!(service.prompts.lock().unwrap()[0].contains("some text here"));
    }

    #[tokio::test]
    async fn test_prose_wrapped_url_response() {
        let service = ScriptedService::new(vec![Reply::Text(
            r#"Sure! {"isCredibleSource": true, "sourceName": "Premium Times", "reliabilityScore": 86, "issues": [], "recommendedAlternatives": []} Hope this helps."#,
        )]);
        let outcome = analyzer(service, fast_settings(1))
            .analyze_url("https://www.premiumtimesng.com/news")
            .await;

        assert!(!outcome.is_fallback());
        let analysis = outcome.analysis();
        assert!(analysis.is_credible_source);
        assert_eq!(analysis.source_name.as_deref(), Some("Premium Times"));
        assert_eq!(analysis.reliability_score, 86);
    }

    #[tokio::test]
    async fn test_garbage_falls_back_without_retry() {
        let service = ScriptedService::new(vec![Reply::Text("no json at all"), Reply::Text(TEXT_JSON)]);
        let outcome = analyzer(service.clone(), fast_settings(3)).analyze_text("some text here").await;

        assert_eq!(outcome.fallback_reason(), Some(&FallbackReason::InvalidResponse));
        let analysis = outcome.analysis();
        assert_eq!(analysis.credibility_score, 50);
        assert_eq!(analysis.issues.len(), 1);
        assert_eq!(analysis.issues[0].kind, FindingKind::Warning);
        assert_eq!(analysis.issues[0].title, "Analysis Error");
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back() {
        let service = ScriptedService::new(vec![Reply::Fail]);
        let outcome = analyzer(service.clone(), fast_settings(1)).analyze_text("some text here").await;

        assert!(matches!(outcome.fallback_reason(), Some(FallbackReason::ServiceError(_))));
        let analysis = outcome.analysis();
        assert_eq!(analysis.credibility_score, 50);
        assert_eq!(analysis.issues[0].title, "Analysis Failed");
        assert_eq!(analysis.suggested_verification_steps[0], "Try again later");
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_url_failure_carries_alternatives() {
        let service = ScriptedService::new(vec![Reply::Fail]);
        let outcome = analyzer(service, fast_settings(1)).analyze_url("https://example.com").await;

        let analysis = outcome.analysis();
        assert!(!analysis.is_credible_source);
        assert_eq!(analysis.source_name.as_deref(), Some("Unknown"));
        assert_eq!(analysis.reliability_score, 50);
        assert_eq!(analysis.issues.len(), 1);
        assert_eq!(
            analysis.recommended_alternatives,
            vec!["punchng.com", "guardian.ng", "channelstv.com"]
        );
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transport_failure() {
        let service = ScriptedService::new(vec![Reply::Fail, Reply::Text(TEXT_JSON)]);
        let outcome = analyzer(service.clone(), fast_settings(2)).analyze_text("some text here").await;

        assert!(!outcome.is_fallback());
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_key_is_not_retried() {
        let service = ScriptedService::new(vec![Reply::NoKey, Reply::Text(TEXT_JSON)]);
        let outcome = analyzer(service.clone(), fast_settings(3)).analyze_text("some text here").await;

        assert_eq!(outcome.fallback_reason(), Some(&FallbackReason::MissingApiKey));
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        for first in [Reply::Status(401), Reply::Status(400), Reply::Unknown] {
            let service = ScriptedService::new(vec![first, Reply::Text(TEXT_JSON)]);
            let outcome = analyzer(service.clone(), fast_settings(3)).analyze_text("some text here").await;

            assert!(matches!(outcome.fallback_reason(), Some(FallbackReason::ServiceError(_))));
            assert_eq!(service.calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let service = ScriptedService::new(vec![Reply::Status(429), Reply::Text(TEXT_JSON)]);
        let outcome = analyzer(service.clone(), fast_settings(2)).analyze_text("some text here").await;

        assert!(!outcome.is_fallback());
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn test_loose_model_json_is_accepted() {
        let service = ScriptedService::new(vec![Reply::Text(
            r#"Result: {"credibilityScore": "35", "issues": [{"title": "No byline", "description": "Author unknown"}], "explanation": "Weak sourcing", "manipulationTechniques": null, "suggestedVerificationSteps": null}"#,
        )]);
        let outcome = analyzer(service, fast_settings(1)).analyze_text("some text here").await;

        assert!(!outcome.is_fallback());
        let analysis = outcome.analysis();
        assert_eq!(analysis.credibility_score, 35);
        assert_eq!(analysis.issues[0].kind, FindingKind::Warning);
        assert_eq!(analysis.issues[0].title, "No byline");
        assert!(analysis.manipulation_techniques.is_empty());

        let service = ScriptedService::new(vec![Reply::Text(
            r#"{"isCredibleSource": true, "sourceName": "Channels TV", "reliabilityScore": 80, "issues": null, "recommendedAlternatives": null}"#,
        )]);
        let outcome = analyzer(service, fast_settings(1)).analyze_url("https://channelstv.com/a").await;
        assert!(!outcome.is_fallback());
        assert!(outcome.analysis().issues.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let service = ScriptedService::new(vec![Reply::Hang]);
        let outcome = analyzer(service, fast_settings(1)).analyze_text("some text here").await;

        assert_eq!(outcome.fallback_reason(), Some(&FallbackReason::Timeout));
        assert_eq!(outcome.analysis().credibility_score, 50);
    }

    #[tokio::test]
    async fn test_cancel_resolves_to_fallback() {
        let service = ScriptedService::new(vec![Reply::Hang]);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let settings = LlmConfig {
            timeout_secs: 600,
            ..LlmConfig::default()
        };
        let analyzer = analyzer(service, settings);

        let cancel = async move {
            let _ = rx.await;
        };
        let task = analyzer.analyze_text_until("some text here", cancel);
        let _ = tx.send(());
        let outcome = task.await;

        assert_eq!(outcome.fallback_reason(), Some(&FallbackReason::Cancelled));
        assert_eq!(outcome.analysis().issues[0].title, "Analysis Failed");
    }
}
