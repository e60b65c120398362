use async_trait::async_trait;

use crate::capabilities::{CapabilityDescriptor, CapabilityInvocation, CapabilityResult};
use crate::error::ModelError;

/// One entry of the running conversation sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationItem {
    User {
        text: String,
    },
    Assistant {
        text: Option<String>,
        invocations: Vec<CapabilityInvocation>,
    },
    Observation {
        invocation_id: String,
        capability: String,
        result: CapabilityResult,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub system: &'a str,
    pub conversation: &'a [ConversationItem],
    pub capabilities: &'a [CapabilityDescriptor],
}

/// Either a final answer (no invocations) or a batch of capability requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: Option<String>,
    pub invocations: Vec<CapabilityInvocation>,
}

impl ModelReply {
    pub fn final_answer(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            invocations: Vec::new(),
        }
    }

    pub fn with_invocations(invocations: Vec<CapabilityInvocation>) -> Self {
        Self {
            text: None,
            invocations,
        }
    }

    pub fn is_final(&self) -> bool {
        self.invocations.is_empty()
    }
}

#[async_trait]
pub trait ModelService: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError>;
}
