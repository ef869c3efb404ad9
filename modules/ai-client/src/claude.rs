use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Knobs for one extraction call.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 1024,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Anthropic Messages client. One call per request; the response is forced
/// through a single tool so output always matches the caller's schema.
#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            http: reqwest::Client::new(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Extract a `T` from the model: define one tool whose input schema is
    /// `T`'s JSON schema, force the model to call it, and deserialize the
    /// tool input.
    pub async fn extract<T: DeserializeOwned + JsonSchema>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: ExtractOptions,
    ) -> Result<T> {
        let tool_name = "structured_response";
        let schema = serde_json::to_value(schemars::schema_for!(T))?;

        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: options.max_tokens,
            system: Some(system_prompt.to_string()),
            temperature: Some(options.temperature),
            messages: vec![WireMessage {
                role: Role::User,
                content: user_prompt.to_string(),
            }],
            tools: vec![ToolDefinition {
                name: tool_name.to_string(),
                description: "Report the structured reading of the input.".to_string(),
                input_schema: schema,
            }],
            tool_choice: serde_json::json!({ "type": "tool", "name": tool_name }),
        };

        debug!(model = %self.model, "claude extract request");

        let url = format!("{}/messages", self.base_url);
        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Claude API error ({status}): {error_text}"));
        }

        let body: ChatResponse = response.json().await?;
        for block in body.content {
            if let ContentBlock::ToolUse { input, .. } = block {
                return serde_json::from_value(input)
                    .map_err(|e| anyhow!("Failed to deserialize tool input: {e}"));
            }
        }

        Err(anyhow!("No structured output in Claude response"))
    }
}

// --- Wire types ---

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    User,
}

#[derive(Debug, Clone, Serialize)]
struct WireMessage {
    role: Role,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ToolDefinition {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    tools: Vec<ToolDefinition>,
    tool_choice: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text {
        #[allow(dead_code)]
        text: String,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[allow(dead_code)]
        id: String,
        #[allow(dead_code)]
        name: String,
        input: serde_json::Value,
    },
}
