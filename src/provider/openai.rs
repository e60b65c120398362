use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{classify_status, classify_transport};
use crate::capabilities::CapabilityInvocation;
use crate::error::ModelError;
use crate::model::{ConversationItem, ModelReply, ModelRequest, ModelService};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Chat-completions client for OpenAI and the services that mirror its API.
pub struct OpenAiCompatibleModel {
    client: Client,
    label: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

impl OpenAiCompatibleModel {
    pub fn new(
        label: &str,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: &str,
    ) -> Self {
        Self {
            client: Client::new(),
            label: label.to_string(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            max_tokens: 4096,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn request_body(&self, request: &ModelRequest<'_>) -> Value {
        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": build_messages(request),
            "tools": build_tools(request),
        })
    }
}

pub fn build_tools(request: &ModelRequest<'_>) -> Vec<Value> {
    request
        .capabilities
        .iter()
        .map(|descriptor| {
            json!({
                "type": "function",
                "function": {
                    "name": descriptor.name,
                    "description": descriptor.purpose,
                    "parameters": descriptor.input_schema(),
                }
            })
        })
        .collect()
}

pub fn build_messages(request: &ModelRequest<'_>) -> Vec<Value> {
    let mut messages = vec![json!({ "role": "system", "content": request.system })];

    for item in request.conversation {
        match item {
            ConversationItem::User { text } => {
                messages.push(json!({ "role": "user", "content": text }));
            }
            ConversationItem::Assistant { text, invocations } => {
                let mut message = json!({ "role": "assistant", "content": text });
                if !invocations.is_empty() {
                    message["tool_calls"] = invocations
                        .iter()
                        .map(|invocation| {
                            json!({
                                "id": invocation.id,
                                "type": "function",
                                "function": {
                                    "name": invocation.name,
                                    "arguments": invocation.arguments.to_string(),
                                }
                            })
                        })
                        .collect::<Vec<Value>>()
                        .into();
                }
                messages.push(message);
            }
            ConversationItem::Observation {
                invocation_id,
                result,
                ..
            } => {
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": invocation_id,
                    "content": result.text(),
                }));
            }
        }
    }

    messages
}

/// Reads the first choice of a chat-completions response.
pub fn parse_reply(body: &Value) -> Result<ModelReply, ModelError> {
    let message = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| ModelError::MalformedResponse("response has no choices".to_string()))?;

    let text = message
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string);

    let invocations = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .map(|call| {
                    let id = call
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    let function = call.get("function").cloned().unwrap_or(Value::Null);
                    let name = function
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    // Arguments arrive as a JSON string; unparsable text is kept
                    // verbatim so registry validation reports it.
                    let arguments = match function.get("arguments") {
                        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
                            .unwrap_or_else(|_| Value::String(raw.clone())),
                        Some(other) => other.clone(),
                        None => Value::Null,
                    };
                    CapabilityInvocation::new(id, name, arguments)
                })
                .collect::<Vec<CapabilityInvocation>>()
        })
        .unwrap_or_default();

    Ok(ModelReply { text, invocations })
}

#[async_trait]
impl ModelService for OpenAiCompatibleModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&self.request_body(&request));
        if let Some(api_key) = self.api_key.as_deref() {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| classify_transport(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|err| ModelError::MalformedResponse(err.to_string()))?;
        parse_reply(&body)
    }
}
