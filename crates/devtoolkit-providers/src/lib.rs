//! Dev Toolkit Providers
//!
//! Single-shot text generation against Google Gemini (`generateContent`)
//! or any OpenAI-compatible `/chat/completions` endpoint

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

const ERROR_BODY_MAX_CHARS: usize = 600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub model: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A text generation backend. One HTTP attempt per call; failures are
/// returned to the caller as-is.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    /// Label used in user-facing replies ("Gemini AI").
    fn display_name(&self) -> &str;
    fn model(&self) -> &str;
    async fn generate_with_model(
        &self,
        prompt: &str,
        model_override: Option<&str>,
    ) -> Result<Generation>;
    async fn generate(&self, prompt: &str) -> Result<Generation> {
        self.generate_with_model(prompt, None).await
    }
    async fn health_check(&self) -> Result<bool>;
}

fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
}

async fn post_json(
    request: reqwest::RequestBuilder,
    url: &str,
    body: &serde_json::Value,
) -> Result<serde_json::Value> {
    let response = request.json(body).send().await?;
    let status = response.status();
    let raw_body = response.text().await?;

    if !status.is_success() {
        return Err(anyhow!(
            "Provider HTTP {} at {}: {}",
            status,
            url,
            truncate_for_error(&raw_body, ERROR_BODY_MAX_CHARS)
        ));
    }

    serde_json::from_str(&raw_body).map_err(|e| {
        anyhow!(
            "Provider response decode failed at {}: {} | body={}",
            url,
            e,
            truncate_for_error(&raw_body, ERROR_BODY_MAX_CHARS)
        )
    })
}

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: non_empty(base_url).unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            model: non_empty(model).unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn parse_response(&self, response: serde_json::Value) -> Result<Generation> {
        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(anyhow!("Gemini API error: {}", message));
        }

        if let Some(reason) = response
            .get("promptFeedback")
            .and_then(|f| f.get("blockReason"))
            .and_then(|v| v.as_str())
        {
            return Err(anyhow!("Gemini blocked the prompt: {}", reason));
        }

        let candidate = response
            .get("candidates")
            .and_then(|v| v.as_array())
            .and_then(|items| items.first())
            .ok_or_else(|| anyhow!("Missing 'candidates' in Gemini response"))?;

        let finish_reason = candidate
            .get("finishReason")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let parts: Vec<&str> = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|v| v.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter(|part| !part.get("thought").and_then(|v| v.as_bool()).unwrap_or(false))
                    .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        if parts.is_empty() {
            return Err(anyhow!(
                "Gemini returned no text (finish_reason={})",
                finish_reason.as_deref().unwrap_or("unknown")
            ));
        }

        let usage = response.get("usageMetadata").map(|u| Usage {
            prompt_tokens: u.get("promptTokenCount").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            completion_tokens: u
                .get("candidatesTokenCount")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            total_tokens: u.get("totalTokenCount").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        });

        let model = response
            .get("modelVersion")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.model)
            .to_string();

        Ok(Generation {
            text: parts.concat(),
            model,
            usage,
            finish_reason,
        })
    }
}

#[async_trait::async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn display_name(&self) -> &str {
        "Gemini AI"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_with_model(
        &self,
        prompt: &str,
        model_override: Option<&str>,
    ) -> Result<Generation> {
        let model = model_override.unwrap_or(&self.model);
        let url = self.generate_url(model);
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ]
        });

        tracing::debug!(
            provider = "gemini",
            model = %model,
            prompt_chars = prompt.chars().count(),
            "Sending generateContent request"
        );

        let request = self.client.post(&url).header("x-goog-api-key", &self.api_key);
        let parsed = post_json(request, &url, &body).await?;
        self.parse_response(parsed)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models/{}", self.base_url, self.model);
        match self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

pub struct OpenAICompatibleProvider {
    client: Client,
    name: String,
    display_name: String,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAICompatibleProvider {
    pub fn new(
        name: String,
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
    ) -> Self {
        let display_name = if name.eq_ignore_ascii_case("openai") {
            "OpenAI".to_string()
        } else {
            name.clone()
        };
        Self {
            client: Client::new(),
            name,
            display_name,
            api_key,
            base_url: non_empty(base_url).unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            model: non_empty(model).unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn parse_response(&self, response: serde_json::Value) -> Result<Generation> {
        if let Some(error) = response.get("error") {
            return Err(anyhow!("API error: {:?}", error));
        }

        let choice = response
            .get("choices")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow!("Missing 'choices' array in provider response"))?
            .first()
            .ok_or_else(|| anyhow!("Empty 'choices' array in provider response"))?;

        let text = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("Missing message content in provider response"))?
            .to_string();

        let finish_reason = choice
            .get("finish_reason")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let usage = response.get("usage").map(|u| Usage {
            prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            completion_tokens: u
                .get("completion_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        });

        let model = response
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.model)
            .to_string();

        Ok(Generation {
            text,
            model,
            usage,
            finish_reason,
        })
    }
}

#[async_trait::async_trait]
impl Provider for OpenAICompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_with_model(
        &self,
        prompt: &str,
        model_override: Option<&str>,
    ) -> Result<Generation> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": model_override.unwrap_or(&self.model),
            "messages": [ { "role": "user", "content": prompt } ]
        });

        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key));
        let parsed = post_json(request, &url, &body).await?;
        self.parse_response(parsed)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);
        match self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}
