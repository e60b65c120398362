use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{classify_status, classify_transport};
use crate::capabilities::CapabilityInvocation;
use crate::error::ModelError;
use crate::model::{ConversationItem, ModelReply, ModelRequest, ModelService};

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicModel {
    pub fn new(api_key: String, model: &str) -> Self {
        Self {
            client: Client::new(),
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
        let tools = request
            .capabilities
            .iter()
            .map(|descriptor| {
                json!({
                    "name": descriptor.name,
                    "description": descriptor.purpose,
                    "input_schema": descriptor.input_schema(),
                })
            })
            .collect::<Vec<Value>>();

        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": request.system,
            "messages": build_messages(request),
            "tools": tools,
        })
    }
}

/// Builds the messages array; consecutive observations share one user turn
/// because the API requires all tool results of a batch together.
pub fn build_messages(request: &ModelRequest<'_>) -> Vec<Value> {
    let mut messages = Vec::<Value>::new();

    for item in request.conversation {
        match item {
            ConversationItem::User { text } => {
                messages.push(json!({ "role": "user", "content": text }));
            }
            ConversationItem::Assistant { text, invocations } => {
                let mut blocks = Vec::<Value>::new();
                if let Some(text) = text.as_deref().filter(|value| !value.trim().is_empty()) {
                    blocks.push(json!({ "type": "text", "text": text }));
                }
                for invocation in invocations {
                    let input = if invocation.arguments.is_object() {
                        invocation.arguments.clone()
                    } else {
                        json!({})
                    };
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": invocation.id,
                        "name": invocation.name,
                        "input": input,
                    }));
                }
                messages.push(json!({ "role": "assistant", "content": blocks }));
            }
            ConversationItem::Observation {
                invocation_id,
                result,
                ..
            } => {
                let block = json!({
                    "type": "tool_result",
                    "tool_use_id": invocation_id,
                    "content": result.text(),
                    "is_error": !result.is_success(),
                });
                let appended = messages
                    .last_mut()
                    .filter(|last| last["role"] == "user")
                    .and_then(|last| last["content"].as_array_mut())
                    .map(|content| content.push(block.clone()))
                    .is_some();
                if !appended {
                    messages.push(json!({ "role": "user", "content": [block] }));
                }
            }
        }
    }

    messages
}

pub fn parse_reply(body: &Value) -> Result<ModelReply, ModelError> {
    let blocks = body
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| ModelError::MalformedResponse("response has no content".to_string()))?;

    let mut text = String::new();
    let mut invocations = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(chunk) = block.get("text").and_then(Value::as_str) {
                    text.push_str(chunk);
                }
            }
            Some("tool_use") => invocations.push(CapabilityInvocation::new(
                block.get("id").and_then(Value::as_str).unwrap_or_default(),
                block
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
                block.get("input").cloned().unwrap_or(Value::Null),
            )),
            _ => {}
        }
    }

    Ok(ModelReply {
        text: (!text.is_empty()).then_some(text),
        invocations,
    })
}

#[async_trait]
impl ModelService for AnthropicModel {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        let response = self
            .client
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request_body(&request))
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
