// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Characters of the submitted text kept on a stored analysis.
pub const ORIGINAL_CONTENT_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Dangerous,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Dangerous,
    ];

    /// Bands: Low 0-25, Medium 26-50, High 51-85, Dangerous 86-100.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=25 => RiskLevel::Low,
            26..=50 => RiskLevel::Medium,
            51..=85 => RiskLevel::High,
            _ => RiskLevel::Dangerous,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Dangerous => "Dangerous",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        RiskLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Text,
    Screenshot,
    Invoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Message,
    Invoice,
}

impl ContentType {
    pub fn classify(mode: ScanMode, has_image: bool) -> Self {
        match (mode, has_image) {
            (ScanMode::Invoice, _) => ContentType::Invoice,
            (ScanMode::Message, true) => ContentType::Screenshot,
            (ScanMode::Message, false) => ContentType::Text,
        }
    }
}

/// Media ready to be inlined into a model request.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineMedia {
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub text: Option<String>,
    pub image: Option<InlineMedia>,
    pub mode: ScanMode,
    pub source_language: Option<String>,
}

impl AnalysisRequest {
    pub fn message(text: Option<String>, image: Option<InlineMedia>) -> Self {
        Self {
            text,
            image,
            mode: ScanMode::Message,
            source_language: None,
        }
    }

    pub fn invoice(document: InlineMedia) -> Self {
        Self {
            text: None,
            image: Some(document),
            mode: ScanMode::Invoice,
            source_language: None,
        }
    }

    pub fn multilingual(text: String, source_language: Option<String>) -> Self {
        Self {
            text: Some(text),
            image: None,
            mode: ScanMode::Message,
            source_language,
        }
    }

    /// The submitted text, or `None` when it is absent or blank.
    pub fn effective_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScamAnalysis {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub scam_score: u8,
    pub risk_level: RiskLevel,
    pub reasons: Vec<String>,
    pub safety_advice: Vec<String>,
    pub ai_explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_content: Option<String>,
    pub has_image: bool,
    pub content_type: ContentType,
}

impl ScamAnalysis {
    pub fn history_item(&self) -> HistoryItem {
        HistoryItem {
            id: self.id,
            timestamp: self.timestamp,
            scam_score: self.scam_score,
            risk_level: self.risk_level,
            content_type: self.content_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub scam_score: u8,
    pub risk_level: RiskLevel,
    pub content_type: ContentType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub text: Option<String>,
    /// Base64 image data, optionally as a `data:` URL.
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageScanRequest {
    pub text: String,
    #[serde(default)]
    pub source_language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    pub session_id: Uuid,
    pub analysis: ScamAnalysis,
}

/// Truncates on a character boundary.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bands_match_tiers() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(25), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(26), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(50), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(51), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(85), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(86), RiskLevel::Dangerous);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Dangerous);
    }

    #[test]
    fn risk_level_parses_case_insensitively() {
        assert_eq!(RiskLevel::parse(" dangerous "), Some(RiskLevel::Dangerous));
        assert_eq!(RiskLevel::parse("Medium"), Some(RiskLevel::Medium));
        assert_eq!(RiskLevel::parse("Critical"), None);
    }

    #[test]
    fn risk_level_serializes_as_tier_name() {
        let json = serde_json::to_string(&RiskLevel::High).unwrap();
        assert_eq!(json, "\"High\"");
    }

    #[test]
    fn content_type_follows_mode_and_image() {
        assert_eq!(
            ContentType::classify(ScanMode::Invoice, true),
            ContentType::Invoice
        );
        assert_eq!(
            ContentType::classify(ScanMode::Message, true),
            ContentType::Screenshot
        );
        assert_eq!(
            ContentType::classify(ScanMode::Message, false),
            ContentType::Text
        );
    }

    #[test]
    fn blank_text_is_not_effective() {
        let request = AnalysisRequest::message(Some("   \n".to_string()), None);
        assert_eq!(request.effective_text(), None);

        let request = AnalysisRequest::message(Some("Your parcel is held".to_string()), None);
        assert_eq!(request.effective_text(), Some("Your parcel is held"));
    }

    #[test]
    fn truncation_respects_multibyte_characters() {
        let text = "नमस्ते".repeat(200);
        let truncated = truncate_chars(&text, ORIGINAL_CONTENT_LIMIT);
        assert_eq!(truncated.chars().count(), ORIGINAL_CONTENT_LIMIT);
        assert_eq!(truncate_chars("short", ORIGINAL_CONTENT_LIMIT), "short");
    }
}
