//! Gemini Mentor Provider
//!
//! Implementation of `MentorProvider` on top of the Gemini
//! `generateContent` API, with a fixed system instruction and a fixed
//! six-field structured-output schema. Anything that does not parse down
//! to the mentorship record is a malformed upstream response.

use std::time::Duration;

use async_trait::async_trait;
use mentor_core::{
    MentorError, MentorProvider, MentorshipRecord, Result,
};
use serde_json::{Value, json};

/// Persona and output rules sent with every request
const SYSTEM_INSTRUCTION: &str = "You are the 'Faith Application Mentor', a wise and friendly \
Christian counselor. Take the 'User Challenge' and, grounded in biblical principles, produce a \
structured mentorship: the central theme, an anchor passage, an applied reflection with a warm \
and personal tone, three concrete practical steps the user can take today, cross references for \
further study, and a short closing prayer. Return the answer ONLY as a JSON object following \
the provided schema.";

/// Gemini provider configuration
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API key
    pub api_key: String,

    /// API base URL
    pub api_base: String,

    /// Model identifier
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-2.5-flash".into(),
            timeout_secs: 30,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| MentorError::Config("GEMINI_API_KEY not set".into()))?;

        let mut config = Self::new(api_key);
        if let Ok(base) = std::env::var("GEMINI_API_BASE") {
            config.api_base = base;
        }
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        Ok(config)
    }
}

/// Gemini-backed mentor provider
pub struct GeminiProvider {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Create from configuration
    pub fn from_config(config: GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MentorError::Config(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(GeminiConfig::from_env()?)
    }

    /// The structured-output schema for the six mentorship fields
    fn response_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "identifiedTheme": {
                    "type": "STRING",
                    "description": "Central theme(s) identified in the user's challenge, e.g. Anxiety, Forgiveness, Direction"
                },
                "anchorPassage": {
                    "type": "STRING",
                    "description": "The central biblical passage for the challenge, e.g. Philippians 4:6-7"
                },
                "appliedReflection": {
                    "type": "STRING",
                    "description": "Reflection and counsel with a friendly tone. Use line breaks (\\n) to format paragraphs."
                },
                "practicalSteps": {
                    "type": "STRING",
                    "description": "Three practical, actionable steps based on the passage and reflection. Use line breaks (\\n) to format."
                },
                "crossReferences": {
                    "type": "STRING",
                    "description": "Further contextual passages for study, e.g. Matthew 6:34, 1 Peter 5:7, Psalm 46:1"
                },
                "closingPrayer": {
                    "type": "STRING",
                    "description": "A short, powerful prayer based on the challenge and passage. Use line breaks (\\n) to format."
                }
            },
            "required": [
                "identifiedTheme",
                "anchorPassage",
                "appliedReflection",
                "practicalSteps",
                "crossReferences",
                "closingPrayer"
            ]
        })
    }

    fn request_body(challenge: &str) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": challenge }]
            }],
            "systemInstruction": {
                "parts": [{ "text": SYSTEM_INSTRUCTION }]
            },
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": Self::response_schema()
            }
        })
    }

    /// Extract the mentorship record out of a generateContent response
    fn parse_response(body: &Value) -> Result<MentorshipRecord> {
        let text = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                MentorError::MalformedUpstreamResponse(
                    "response carries no candidate text".into(),
                )
            })?;

        serde_json::from_str(text).map_err(|e| {
            MentorError::MalformedUpstreamResponse(format!("schema mismatch: {e}"))
        })
    }
}

#[async_trait]
impl MentorProvider for GeminiProvider {
    async fn generate(&self, challenge: &str) -> Result<MentorshipRecord> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.api_base, self.config.model
        );

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&Self::request_body(challenge))
            .send()
            .await
            .map_err(|e| MentorError::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(MentorError::UpstreamUnavailable(format!(
                "generator returned {status}: {detail}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| MentorError::MalformedUpstreamResponse(e.to_string()))?;

        let record = Self::parse_response(&body)?;
        tracing::debug!(theme = %record.identified_theme, "mentorship generated");
        Ok(record)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.config.api_base);

        match self
            .http
            .get(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("generator health check failed: {}", e);
                Ok(false)
            }
        }
    }
}
