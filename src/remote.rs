use crate::analysis::AnalysisResult;
use crate::email::EmailData;
use crate::settings::Settings;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const BODY_EXCERPT_CHARS: usize = 2000;
const MAX_LINKS_IN_PROMPT: usize = 10;
const TEMPERATURE: f64 = 0.3;
const MAX_TOKENS: u32 = 800;

const SYSTEM_PROMPT: &str = "You are a conservative phishing-detection expert. \
You only flag an email as phishing when the evidence is strong. \
You reply with raw JSON only: no prose, no markdown, no code fences.";

/// Remote scan failure taxonomy. None of these reach the end user as a hard
/// failure; the router converts them into a local-heuristic fallback.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("no API credential configured")]
    Configuration,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("model response contained no parseable JSON: {0}")]
    MalformedResponse(String),
    #[error("model response JSON is missing required fields: {0}")]
    InvalidSchema(String),
}

/// Discriminant of [`ScanError`], kept on the fallback outcome for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanErrorKind {
    Configuration,
    Transport,
    EmptyResponse,
    MalformedResponse,
    InvalidSchema,
}

impl ScanError {
    pub fn kind(&self) -> ScanErrorKind {
        match self {
            ScanError::Configuration => ScanErrorKind::Configuration,
            ScanError::Transport(_) => ScanErrorKind::Transport,
            ScanError::EmptyResponse => ScanErrorKind::EmptyResponse,
            ScanError::MalformedResponse(_) => ScanErrorKind::MalformedResponse,
            ScanError::InvalidSchema(_) => ScanErrorKind::InvalidSchema,
        }
    }
}

/// Scanner backed by a chat-completion text-generation endpoint. Returns the
/// model's verdict as parsed and validated, before reconciliation; persistence
/// is the router's job so this stays independently testable.
pub struct RemoteScanner {
    client: Client,
}

impl RemoteScanner {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("phishguard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub async fn scan(
        &self,
        email: &EmailData,
        settings: &Settings,
    ) -> Result<AnalysisResult, ScanError> {
        // Callers should not reach this path without a credential.
        let api_key = settings.api_key.as_deref().ok_or(ScanError::Configuration)?;

        let request = json!({
            "model": settings.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_user_prompt(email)},
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });

        log::debug!("requesting remote analysis from {} ({})", settings.endpoint, settings.model);
        let response = self
            .client
            .post(&settings.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ScanError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| format!("request failed with status {status}"));
            return Err(ScanError::Transport(message));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ScanError::Transport(e.to_string()))?;
        let content = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or(ScanError::EmptyResponse)?;

        parse_model_output(content)
    }
}

fn build_user_prompt(email: &EmailData) -> String {
    let body_excerpt: String = email.body.chars().take(BODY_EXCERPT_CHARS).collect();
    let links = if email.links.is_empty() {
        "(none)".to_string()
    } else {
        email
            .links
            .iter()
            .take(MAX_LINKS_IN_PROMPT)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Analyze this email for phishing.\n\n\
         From: {}\n\
         Subject: {}\n\
         Body:\n{}\n\n\
         Links:\n{}\n\n\
         Only flag as phishing when multiple strong indicators are present, such as \
         credential or payment requests, links whose hosts do not match the claimed \
         sender, urgent threats, or sender spoofing. Signs an email is legitimate: \
         links to well-known domains, links matching the sender's domain, a \
         professional tone, and no requests for sensitive data.\n\n\
         Respond with exactly this JSON object and nothing else:\n\
         {{\"isPhishing\": true or false, \"confidence\": 0-100, \
         \"indicators\": [\"...\"], \"recommendation\": \"...\"}}",
        email.from, email.subject, body_excerpt, links
    )
}

/// Turn the assistant's text into a validated [`AnalysisResult`].
///
/// Models wrap output in markdown fences or pad it with prose often enough
/// that this takes the first balanced `{...}` span rather than parsing the
/// whole content.
pub fn parse_model_output(content: &str) -> Result<AnalysisResult, ScanError> {
    let text = strip_code_fence(content);
    let span = first_json_object(text).ok_or_else(|| {
        ScanError::MalformedResponse("no balanced JSON object in model output".to_string())
    })?;
    let value: Value =
        serde_json::from_str(span).map_err(|e| ScanError::MalformedResponse(e.to_string()))?;
    validate_verdict(&value)
}

fn strip_code_fence(content: &str) -> &str {
    let text = content.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop a language tag like ```json on the opening fence.
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// First balanced `{...}` span, tracking string literals so braces inside
/// quoted values do not skew the depth count.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn validate_verdict(value: &Value) -> Result<AnalysisResult, ScanError> {
    let is_phishing = value
        .get("isPhishing")
        .and_then(Value::as_bool)
        .ok_or_else(|| ScanError::InvalidSchema("isPhishing must be a boolean".to_string()))?;
    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| ScanError::InvalidSchema("confidence must be a number".to_string()))?;
    let indicators = value
        .get("indicators")
        .and_then(Value::as_array)
        .ok_or_else(|| ScanError::InvalidSchema("indicators must be an array".to_string()))?
        .iter()
        .map(|v| {
            v.as_str().map(str::to_string).ok_or_else(|| {
                ScanError::InvalidSchema("indicators must contain only strings".to_string())
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let recommendation = value
        .get("recommendation")
        .and_then(Value::as_str)
        .ok_or_else(|| ScanError::InvalidSchema("recommendation must be a string".to_string()))?
        .to_string();

    Ok(AnalysisResult {
        is_phishing,
        confidence: confidence.round().clamp(0.0, 100.0) as u32,
        indicators,
        recommendation,
    })
}
