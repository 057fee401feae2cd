// NaijaVerify Data Models
// Shapes exchanged between the scorers, the LLM adapter, the store and the CLI

use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

// ============ Content & Findings ============

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Image,
    Video,
    Url,
    Text,
}

impl ContentType {
    pub const ALL: [ContentType; 4] = [
        ContentType::Image,
        ContentType::Video,
        ContentType::Url,
        ContentType::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Image => "image",
            ContentType::Video => "video",
            ContentType::Url => "url",
            ContentType::Text => "text",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "image" => Some(ContentType::Image),
            "video" => Some(ContentType::Video),
            "url" => Some(ContentType::Url),
            "text" => Some(ContentType::Text),
            _ => None,
        }
    }

    /// Image and video need a file upload instead of inline content.
    pub fn is_file_based(&self) -> bool {
        matches!(self, ContentType::Image | ContentType::Video)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    Issue,
    #[default]
    Warning,
    Positive,
}

// Models occasionally invent tags; anything unrecognised reads as a warning.
impl<'de> Deserialize<'de> for FindingKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(match raw.trim().to_ascii_lowercase().as_str() {
            "issue" => FindingKind::Issue,
            "positive" => FindingKind::Positive,
            _ => FindingKind::Warning,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    #[serde(rename = "type", default)]
    pub kind: FindingKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

impl Finding {
    pub fn new(kind: FindingKind, title: &str, description: &str) -> Self {
        Self {
            kind,
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    pub fn warning(title: &str, description: &str) -> Self {
        Self::new(FindingKind::Warning, title, description)
    }
}

// ============ Full Analysis Record ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub title: String,
    pub source: String,
    /// Overall authenticity score, 0-100.
    pub score: u8,
    pub manipulation_score: u8,
    pub source_reliability_score: u8,
    pub context_accuracy_score: u8,
    pub findings: Vec<Finding>,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_facts: Option<Vec<String>>,
}

// ============ Local Heuristics ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Indicator {
    pub pattern: String,
    /// Pattern weight scaled to 0-10.
    pub severity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextAnalysisResult {
    pub score: u8,
    pub indicators: Vec<Indicator>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceCredibilityResult {
    pub is_credible: bool,
    pub source_name: Option<String>,
    pub reliability_score: u8,
}

impl SourceCredibilityResult {
    pub fn unparseable() -> Self {
        Self {
            is_credible: false,
            source_name: None,
            reliability_score: 0,
        }
    }
}

// ============ LLM Payloads ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextAiAnalysis {
    #[serde(deserialize_with = "deserialize_score")]
    pub credibility_score: u8,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<Finding>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub explanation: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub manipulation_techniques: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub suggested_verification_steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UrlAiAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_credible_source: bool,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(deserialize_with = "deserialize_score")]
    pub reliability_score: u8,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<Finding>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommended_alternatives: Vec<String>,
}

/// Why the adapter returned its canned payload instead of a model answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind", content = "message")]
pub enum FallbackReason {
    InvalidResponse,
    ServiceError(String),
    Timeout,
    Cancelled,
    MissingApiKey,
}

impl FallbackReason {
    /// Whether the upstream call itself failed, as opposed to answering badly.
    pub fn is_service_failure(&self) -> bool {
        !matches!(self, FallbackReason::InvalidResponse)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum AiOutcome<T> {
    Parsed { analysis: T },
    Fallback { reason: FallbackReason, analysis: T },
}

impl<T> AiOutcome<T> {
    pub fn analysis(&self) -> &T {
        match self {
            AiOutcome::Parsed { analysis } | AiOutcome::Fallback { analysis, .. } => analysis,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, AiOutcome::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            AiOutcome::Parsed { .. } => None,
            AiOutcome::Fallback { reason, .. } => Some(reason),
        }
    }
}

// ============ Action Results ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextActionResult {
    pub score: u8,
    pub findings: Vec<Finding>,
    pub explanation: String,
    pub manipulation_techniques: Vec<String>,
    pub suggested_verification_steps: Vec<String>,
    pub basic_analysis: TextAnalysisResult,
    pub ai_analysis: AiOutcome<TextAiAnalysis>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UrlActionResult {
    pub score: u8,
    pub findings: Vec<Finding>,
    pub explanation: String,
    pub recommended_alternatives: Vec<String>,
    pub basic_analysis: SourceCredibilityResult,
    pub ai_analysis: AiOutcome<UrlAiAnalysis>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ActionResult {
    Text(TextActionResult),
    Url(UrlActionResult),
}

impl ActionResult {
    pub fn score(&self) -> u8 {
        match self {
            ActionResult::Text(r) => r.score,
            ActionResult::Url(r) => r.score,
        }
    }
}

// ============ Submissions & Storage ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub name: String,
    #[serde(default)]
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub file: Option<UploadedFile>,
}

impl Submission {
    pub fn text(text: &str) -> Self {
        Self {
            content_type: ContentType::Text,
            content: Some(text.to_string()),
            file: None,
        }
    }

    pub fn url(url: &str) -> Self {
        Self {
            content_type: ContentType::Url,
            content: Some(url.to_string()),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnalysis {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub content: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
    pub result: ActionResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub id: String,
    pub result: ActionResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScore {
    Number(f64),
    Text(String),
}

/// Accept a JSON number or numeric string (`"40"`, `"40%"`) and pin it to an
/// integer score in 0-100.
fn deserialize_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match RawScore::deserialize(deserializer)? {
        RawScore::Number(n) => n,
        RawScore::Text(text) => text
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("invalid score '{}'", text)))?,
    };
    Ok(clamp_score(raw))
}

/// `null` reads the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_parse() {
        assert_eq!(ContentType::parse("URL"), Some(ContentType::Url));
        assert_eq!(ContentType::parse(" text "), Some(ContentType::Text));
        assert_eq!(ContentType::parse("audio"), None);
        assert!(ContentType::Video.is_file_based());
        assert!(!ContentType::Text.is_file_based());
    }

    #[test]
    fn test_unknown_finding_kind_reads_as_warning() {
        let finding: Finding =
            serde_json::from_str(r#"{"type":"suspicious","title":"t","description":"d"}"#).unwrap();
        assert_eq!(finding.kind, FindingKind::Warning);

        let finding: Finding =
            serde_json::from_str(r#"{"type":"positive","title":"t","description":"d"}"#).unwrap();
        assert_eq!(finding.kind, FindingKind::Positive);
    }

    #[test]
    fn test_score_deserialization_clamps() {
        let parsed: TextAiAnalysis =
            serde_json::from_str(r#"{"credibilityScore": 72.6}"#).unwrap();
        assert_eq!(parsed.credibility_score, 73);
        assert!(parsed.issues.is_empty());

        let parsed: UrlAiAnalysis =
            serde_json::from_str(r#"{"reliabilityScore": 140, "isCredibleSource": true}"#).unwrap();
        assert_eq!(parsed.reliability_score, 100);
        assert!(parsed.is_credible_source);
    }

    #[test]
    fn test_null_collections_read_as_empty() {
        let parsed: TextAiAnalysis = serde_json::from_str(
            r#"{"credibilityScore": 30, "issues": null, "explanation": null, "manipulationTechniques": null, "suggestedVerificationSteps": null}"#,
        )
        .unwrap();
        assert_eq!(parsed.credibility_score, 30);
        assert!(parsed.issues.is_empty());
        assert!(parsed.explanation.is_empty());
        assert!(parsed.suggested_verification_steps.is_empty());

        let parsed: UrlAiAnalysis = serde_json::from_str(
            r#"{"reliabilityScore": 60, "isCredibleSource": null, "sourceName": null, "issues": null, "recommendedAlternatives": null}"#,
        )
        .unwrap();
        assert!(!parsed.is_credible_source);
        assert_eq!(parsed.source_name, None);
        assert!(parsed.recommended_alternatives.is_empty());
    }

    #[test]
    fn test_numeric_string_scores() {
        let parsed: TextAiAnalysis = serde_json::from_str(r#"{"credibilityScore": "40"}"#).unwrap();
        assert_eq!(parsed.credibility_score, 40);

        let parsed: UrlAiAnalysis = serde_json::from_str(r#"{"reliabilityScore": " 72.5% "}"#).unwrap();
        assert_eq!(parsed.reliability_score, 73);

        assert!(serde_json::from_str::<TextAiAnalysis>(r#"{"credibilityScore": "high"}"#).is_err());
    }

    #[test]
    fn test_finding_without_type_is_warning() {
        let parsed: TextAiAnalysis = serde_json::from_str(
            r#"{"credibilityScore": 20, "issues": [{"title": "Unverified", "description": null}, {"type": null, "title": "t"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.issues.len(), 2);
        assert_eq!(parsed.issues[0].kind, FindingKind::Warning);
        assert_eq!(parsed.issues[0].title, "Unverified");
        assert!(parsed.issues[0].description.is_empty());
        assert_eq!(parsed.issues[1].kind, FindingKind::Warning);
    }

    #[test]
    fn test_missing_score_is_rejected() {
        let parsed = serde_json::from_str::<TextAiAnalysis>(r#"{"explanation": "x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_ai_outcome_serialization_is_tagged() {
        let outcome: AiOutcome<UrlAiAnalysis> = AiOutcome::Fallback {
            reason: FallbackReason::Timeout,
            analysis: UrlAiAnalysis {
                is_credible_source: false,
                source_name: None,
                reliability_score: 50,
                issues: Vec::new(),
                recommended_alternatives: Vec::new(),
            },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "fallback");
        assert_eq!(json["reason"]["kind"], "timeout");
        assert_eq!(json["analysis"]["reliabilityScore"], 50);
        assert!(outcome.is_fallback());
    }
}
