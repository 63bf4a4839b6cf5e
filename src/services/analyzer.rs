// src/services/analyzer.rs
use crate::errors::ScamGuardError;
use crate::models::*;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::{debug, error, info};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use uuid::Uuid;

const MESSAGE_INSTRUCTION: &str = r#"You are an expert cybersecurity analyst specialized in identifying digital scams, phishing, and fraud globally.

MANDATORY PROCESSING FLOW FOR ALL UPLOADS:
Step 1: OCR EXTRACTION - Accurately extract all text from the provided image/screenshot. Support 100+ languages including Hindi, Tamil, Bengali, Arabic, Spanish, French, Chinese, and Japanese.
Step 2: LANGUAGE DETECTION - Identify the source language of the extracted text automatically.
Step 3: TRANSLATION - Provide a high-quality English translation of all detected text.
Step 4: SCAM ANALYSIS - Analyze the English translation for the following indicators:
   - PAYMENT REQUESTS: UPI IDs, crypto wallets, bank detail requests, gift cards, or escrow fraud.
   - FAKE JOB LANGUAGE: Unrealistic salary promises, "simple task" work, hiring via Telegram/WhatsApp.
   - URGENT THREATS: Account suspension, electricity cutoff, legal summons, or parcel delivery issues.
   - SUSPICIOUS LINKS: Shortened URLs (bit.ly, tinyurl), non-official domain names, or lookalike bank portals.
   - DATA REQUESTS: Asking for OTP, PIN, CVV, passwords, or identity documents.
   - PSYCHOLOGICAL MANIPULATION: Emotional stories ("friend in trouble"), fake rewards, or urgency.

Always return a structured JSON response according to the schema. If no image is provided, focus on the text input."#;

const INVOICE_INSTRUCTION: &str = r#"You are an expert financial auditor and fraud detection analyst.
Analyze the provided invoice, bill, or payment screenshot for manipulation or fraud.
Look for signs of editing, fake logos, suspicious UPI IDs, or calculation errors.
Provide a scam probability score (0-100), risk level, detection findings, explanation, and safety advice."#;

const MESSAGE_IMAGE_PROMPT: &str = "Execute the mandatory 4-step flow: Read this screenshot, detect the language, translate it to English, and check for scam indicators.";
const INVOICE_IMAGE_PROMPT: &str = "Check this image for signs of invoice manipulation.";

#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> Result<ScamAnalysis, ScamGuardError>;

    async fn analyze_multilingual(
        &self,
        text: String,
        source_language: Option<String>,
    ) -> Result<ScamAnalysis, ScamGuardError> {
        self.analyze(AnalysisRequest::multilingual(text, source_language))
            .await
    }
}

pub struct GeminiService {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl GeminiService {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, ScamGuardError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScamGuardError::Provider(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            model,
            base_url,
            client,
        })
    }

    async fn generate(&self, body: &Value) -> Result<String, ScamGuardError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ScamGuardError::Provider(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ScamGuardError::Provider(format!(
                "Gemini error ({}): {}",
                status, error_text
            )));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| ScamGuardError::Provider(format!("Failed to parse Gemini response: {}", e)))?;

        candidate_text(&result)
    }
}

#[async_trait]
impl Analyzer for GeminiService {
    async fn analyze(&self, request: AnalysisRequest) -> Result<ScamAnalysis, ScamGuardError> {
        let start = Instant::now();
        let body = build_request_body(&request)?;

        info!(
            "Requesting {:?} analysis from {} (image: {})",
            request.mode,
            self.model,
            request.image.is_some()
        );

        let analysis = self
            .generate(&body)
            .await
            .and_then(|text| normalize_response(&text, &request))
            .map_err(|e| {
                error!("Analysis request failed: {}", e);
                e
            })?;

        info!(
            "Analysis {} finished in {}ms: score {} ({})",
            analysis.id,
            start.elapsed().as_millis(),
            analysis.scam_score,
            analysis.risk_level
        );

        Ok(analysis)
    }
}

pub fn response_schema() -> Value {
    let tiers: Vec<&str> = RiskLevel::ALL.iter().map(|level| level.as_str()).collect();

    json!({
        "type": "OBJECT",
        "properties": {
            "scamScore": {
                "type": "NUMBER",
                "description": "A probability score between 0 and 100 representing how likely the content is a scam."
            },
            "riskLevel": {
                "type": "STRING",
                "enum": tiers,
                "description": "The calculated risk level based on the score: Low (0-25), Medium (26-50), High (51-85), Dangerous (86-100)."
            },
            "reasons": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "List of specific red flags discovered (e.g., 'Sense of urgency', 'Suspicious link', 'Fake job tone')."
            },
            "aiExplanation": {
                "type": "STRING",
                "description": "A detailed but concise explanation of why the content was rated this way, highlighting manipulation patterns."
            },
            "safetyAdvice": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Actionable advice for the user to stay safe from this specific type of threat."
            },
            "detectedLanguage": {
                "type": "STRING",
                "description": "The name of the detected source language (e.g., 'Bengali', 'Arabic', 'Hindi')."
            },
            "translation": {
                "type": "STRING",
                "description": "A complete and accurate English translation of the extracted content."
            },
            "extractedText": {
                "type": "STRING",
                "description": "The raw text exactly as it was read from the screenshot (OCR results)."
            }
        },
        "required": [
            "scamScore",
            "riskLevel",
            "reasons",
            "aiExplanation",
            "safetyAdvice",
            "detectedLanguage",
            "translation",
            "extractedText"
        ]
    })
}

pub fn build_request_body(request: &AnalysisRequest) -> Result<Value, ScamGuardError> {
    let text = request.effective_text();
    if text.is_none() && request.image.is_none() {
        return Err(ScamGuardError::Validation(
            "No content provided for analysis.".to_string(),
        ));
    }

    let (instruction, text_prefix, image_prompt) = match request.mode {
        ScanMode::Message => (MESSAGE_INSTRUCTION, "Analyze this content:", MESSAGE_IMAGE_PROMPT),
        ScanMode::Invoice => (
            INVOICE_INSTRUCTION,
            "Verify this invoice details:",
            INVOICE_IMAGE_PROMPT,
        ),
    };

    let mut parts = Vec::new();
    if let Some(text) = text {
        let body = match request.source_language.as_deref().map(str::trim) {
            Some(language) if !language.is_empty() => format!(
                "The user reports this content is written in {}.\n{}\n\n{}",
                language, text_prefix, text
            ),
            _ => format!("{}\n\n{}", text_prefix, text),
        };
        parts.push(json!({ "text": body }));
    }
    if let Some(media) = &request.image {
        parts.push(json!({
            "inlineData": {
                "mimeType": media.mime_type,
                "data": general_purpose::STANDARD.encode(&media.data)
            }
        }));
        parts.push(json!({ "text": image_prompt }));
    }

    Ok(json!({
        "systemInstruction": { "parts": [{ "text": instruction }] },
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema()
        }
    }))
}

fn candidate_text(result: &Value) -> Result<String, ScamGuardError> {
    let parts = result["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| ScamGuardError::Provider("No content in Gemini response".to_string()))?;

    Ok(parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .concat())
}

/// Maps the model's JSON reply onto a `ScamAnalysis`, defaulting anything missing.
pub fn normalize_response(
    text: &str,
    request: &AnalysisRequest,
) -> Result<ScamAnalysis, ScamGuardError> {
    let trimmed = text.trim();
    let data: Value = if trimmed.is_empty() {
        json!({})
    } else {
        serde_json::from_str(trimmed)
            .map_err(|e| ScamGuardError::Provider(format!("Failed to parse analysis JSON: {}", e)))?
    };

    let scam_score = clamp_score(&data["scamScore"]);
    let risk_level = RiskLevel::from_score(scam_score);

    if let Some(reported) = data["riskLevel"].as_str() {
        if RiskLevel::parse(reported) != Some(risk_level) {
            debug!(
                "Model reported tier '{}' for score {}, using {}",
                reported, scam_score, risk_level
            );
        }
    }

    let has_image = request.image.is_some();

    Ok(ScamAnalysis {
        id: Uuid::new_v4(),
        timestamp: chrono::Utc::now(),
        scam_score,
        risk_level,
        reasons: string_list(&data["reasons"]),
        safety_advice: string_list(&data["safetyAdvice"]),
        ai_explanation: data["aiExplanation"].as_str().unwrap_or("").to_string(),
        detected_language: optional_string(&data["detectedLanguage"]),
        translation: optional_string(&data["translation"]),
        extracted_text: optional_string(&data["extractedText"]),
        original_content: request
            .effective_text()
            .map(|t| truncate_chars(t, ORIGINAL_CONTENT_LIMIT)),
        has_image,
        content_type: ContentType::classify(request.mode, has_image),
    })
}

fn clamp_score(value: &Value) -> u8 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        _ => 0.0,
    };

    if !raw.is_finite() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|s| s.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn optional_string(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
