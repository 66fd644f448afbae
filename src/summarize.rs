use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{ConfigError, SummarizeError};

static JSON_BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

const PROMPT_HEADER: &str = "You are an expert educational video analyst. Analyze the following YouTube video transcript and provide:
1. Ratings (1-5) for: Clarity of Content, Emotional Impact, Video Structure, Retention Power, Commercial Balance.
2. A summary overview of the video (2-3 sentences).
3. Three positive points (bullet list).
4. Two areas for improvement (bullet list).
5. Five actionable suggestions for teachers to improve future videos, focusing on content quality, retention, and engagement.

Transcript:
";

const PROMPT_SCHEMA: &str = r#"

Respond in strict JSON with this structure:
{
  "finalVerdict": {
    "clarityOfContent": number,
    "emotionalImpact": number,
    "videoStructure": number,
    "retentionPower": number,
    "commercialBalance": number
  },
  "videoSummary": {
    "overview": string,
    "positivePoints": [string],
    "negativePoints": [string],
    "suggestions": [string]
  }
}"#;

/// Five 1-5 ratings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalVerdict {
    pub clarity_of_content: u8,
    pub emotional_impact: u8,
    pub video_structure: u8,
    pub retention_power: u8,
    pub commercial_balance: u8,
}

impl FinalVerdict {
    fn ratings(&self) -> [(&'static str, u8); 5] {
        [
            ("clarityOfContent", self.clarity_of_content),
            ("emotionalImpact", self.emotional_impact),
            ("videoStructure", self.video_structure),
            ("retentionPower", self.retention_power),
            ("commercialBalance", self.commercial_balance),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub overview: String,
    #[serde(default)]
    pub positive_points: Vec<String>,
    #[serde(default)]
    pub negative_points: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Review of a video transcript, as persisted to `{id}.analysis.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredReview {
    pub final_verdict: FinalVerdict,
    pub video_summary: VideoSummary,
}

/// Which API a model name is served by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Gemini,
    Anthropic,
    OpenAi,
}

impl Backend {
    pub fn for_model(model: &str) -> Self {
        if model.starts_with("gemini") {
            Backend::Gemini
        } else if model.starts_with("claude") {
            Backend::Anthropic
        } else {
            Backend::OpenAi
        }
    }

    fn label(self) -> &'static str {
        match self {
            Backend::Gemini => "Gemini",
            Backend::Anthropic => "Anthropic",
            Backend::OpenAi => "OpenAI",
        }
    }
}

pub fn build_prompt(transcript_text: &str) -> String {
    format!("{PROMPT_HEADER}\"\"\"\n{transcript_text}\n\"\"\"{PROMPT_SCHEMA}")
}

/// One blocking request/response review call; never retried
#[derive(Debug, Clone)]
pub struct Summarizer {
    client: reqwest::Client,
    model: String,
    api_key: String,
}

impl Summarizer {
    pub fn new(client: reqwest::Client, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Fails if the key for the configured model is missing
    pub fn from_config(config: &Config, client: reqwest::Client) -> Result<Self, ConfigError> {
        Ok(Self::new(client, &config.model, config.summarizer_key()?))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn summarize(&self, transcript_text: &str) -> Result<StructuredReview, SummarizeError> {
        let backend = Backend::for_model(&self.model);
        debug!("Reviewing transcript via {} with model {}", backend.label(), self.model);

        let prompt = build_prompt(transcript_text);
        let text = match backend {
            Backend::Gemini => self.call_gemini(&prompt).await?,
            Backend::Anthropic => self.call_anthropic(&prompt).await?,
            Backend::OpenAi => self.call_openai(&prompt).await?,
        };
        parse_review(&text)
    }

    async fn post_json(
        &self,
        backend: Backend,
        request: reqwest::RequestBuilder,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, SummarizeError> {
        let http = |source: reqwest::Error| SummarizeError::Http {
            provider: backend.label(),
            source,
        };

        let resp = request
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(http)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SummarizeError::Api {
                provider: backend.label(),
                status,
                body,
            });
        }

        resp.json().await.map_err(http)
    }

    async fn call_gemini(&self, prompt: &str) -> Result<String, SummarizeError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        let request = self.client.post(url).query(&[("key", &self.api_key)]);
        let json = self.post_json(Backend::Gemini, request, &body).await?;
        extract_gemini_text(&json)
    }

    async fn call_anthropic(&self, prompt: &str) -> Result<String, SummarizeError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 4096,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });
        let request = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01");
        let json = self.post_json(Backend::Anthropic, request, &body).await?;
        extract_anthropic_text(&json)
    }

    async fn call_openai(&self, prompt: &str) -> Result<String, SummarizeError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });
        let request = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key);
        let json = self.post_json(Backend::OpenAi, request, &body).await?;
        extract_openai_text(&json)
    }
}

fn extract_gemini_text(json: &serde_json::Value) -> Result<String, SummarizeError> {
    let text: String = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text")?.as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    if text.is_empty() {
        return Err(SummarizeError::MalformedResponse(
            "unexpected Gemini API response format".to_string(),
        ));
    }
    Ok(text)
}

fn extract_anthropic_text(json: &serde_json::Value) -> Result<String, SummarizeError> {
    if let Some(content) = json.get("content").and_then(|c| c.as_array()) {
        let text: String = content
            .iter()
            .filter_map(|block| {
                if block.get("type")?.as_str()? == "text" {
                    block.get("text")?.as_str().map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");
        if !text.is_empty() {
            return Ok(text);
        }
    }
    Err(SummarizeError::MalformedResponse(
        "unexpected Anthropic API response format".to_string(),
    ))
}

fn extract_openai_text(json: &serde_json::Value) -> Result<String, SummarizeError> {
    if let Some(text) = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
    {
        return Ok(text.to_string());
    }
    Err(SummarizeError::MalformedResponse(
        "unexpected OpenAI API response format".to_string(),
    ))
}

/// Pull the outermost JSON object out of model output and check the ratings
pub fn parse_review(text: &str) -> Result<StructuredReview, SummarizeError> {
    let block = JSON_BLOCK
        .find(text)
        .ok_or_else(|| SummarizeError::MalformedResponse("no JSON found in response".to_string()))?;

    let review: StructuredReview = serde_json::from_str(block.as_str())
        .map_err(|e| SummarizeError::MalformedResponse(format!("invalid review JSON: {e}")))?;

    for (name, value) in review.final_verdict.ratings() {
        if !(1..=5).contains(&value) {
            return Err(SummarizeError::MalformedResponse(format!(
                "{name} rating {value} is outside 1-5"
            )));
        }
    }

    Ok(review)
}
