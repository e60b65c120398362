pub mod path_policy;
pub mod read;
pub mod write;

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value, json};

pub use path_policy::PathPolicy;

pub const READ_TEXT_CAPABILITY: &str = "read_text";
pub const READ_PDF_CAPABILITY: &str = "read_pdf";
pub const WRITE_FILE_CAPABILITY: &str = "write_file";

/// The closed set of operations the model may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ReadText,
    ReadPdf,
    WriteFile,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::ReadText,
        Capability::ReadPdf,
        Capability::WriteFile,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Capability::ReadText => READ_TEXT_CAPABILITY,
            Capability::ReadPdf => READ_PDF_CAPABILITY,
            Capability::WriteFile => WRITE_FILE_CAPABILITY,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Capability::ALL
            .into_iter()
            .find(|capability| capability.name() == name.trim())
    }

    pub fn descriptor(self) -> CapabilityDescriptor {
        let path = ParamSpec {
            name: "path",
            description: "Path of the file, relative to the workspace root or absolute",
            required: true,
        };
        match self {
            Capability::ReadText => CapabilityDescriptor {
                name: self.name(),
                purpose: "Read a UTF-8 text file and return its full content.",
                params: vec![path],
            },
            Capability::ReadPdf => CapabilityDescriptor {
                name: self.name(),
                purpose: "Read a PDF file and return the text of all pages in page order.",
                params: vec![path],
            },
            Capability::WriteFile => CapabilityDescriptor {
                name: self.name(),
                purpose: "Write content to a file, creating parent directories and overwriting \
                          any existing file.",
                params: vec![
                    ParamSpec {
                        name: "path",
                        description: "Path of the file to write",
                        required: true,
                    },
                    ParamSpec {
                        name: "content",
                        description: "Full text content to write",
                        required: true,
                    },
                ],
            },
        }
    }
}

/// A named string parameter of a capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    pub name: &'static str,
    pub purpose: &'static str,
    pub params: Vec<ParamSpec>,
}

impl CapabilityDescriptor {
    /// JSON schema of the arguments object, as model providers expect it.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            properties.insert(
                param.name.to_string(),
                json!({ "type": "string", "description": param.description }),
            );
        }
        let required = self
            .params
            .iter()
            .filter(|param| param.required)
            .map(|param| param.name)
            .collect::<Vec<&str>>();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// A model-produced request to run one capability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl CapabilityInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    pub fn string_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// Outcome of a capability, always string-shaped so it can be fed back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "output", rename_all = "lowercase")]
pub enum CapabilityResult {
    Success(String),
    Error(String),
}

impl CapabilityResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CapabilityResult::Success(_))
    }

    pub fn text(&self) -> &str {
        match self {
            CapabilityResult::Success(text) | CapabilityResult::Error(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityError {
    pub code: &'static str,
    pub message: String,
}

impl CapabilityError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error ({}): {}", self.code, self.message)
    }
}

impl std::error::Error for CapabilityError {}

impl From<CapabilityError> for CapabilityResult {
    fn from(err: CapabilityError) -> Self {
        CapabilityResult::Error(err.to_string())
    }
}

/// A validated invocation with its arguments extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityCall {
    ReadText { path: String },
    ReadPdf { path: String },
    WriteFile { path: String, content: String },
}

impl CapabilityCall {
    pub fn capability(&self) -> Capability {
        match self {
            CapabilityCall::ReadText { .. } => Capability::ReadText,
            CapabilityCall::ReadPdf { .. } => Capability::ReadPdf,
            CapabilityCall::WriteFile { .. } => Capability::WriteFile,
        }
    }
}

fn required_string_arg(
    capability: Capability,
    args: &Map<String, Value>,
    key: &str,
) -> Result<String, CapabilityError> {
    match args.get(key) {
        None | Some(Value::Null) => Err(CapabilityError::new(
            "invalid_args",
            format!("'{key}' is required for {}", capability.name()),
        )),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(CapabilityError::new(
            "invalid_args",
            format!("'{key}' must be a string for {}", capability.name()),
        )),
    }
}

/// Fixed set of capabilities plus the path policy they execute under.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    descriptors: Vec<CapabilityDescriptor>,
    policy: PathPolicy,
}

impl CapabilityRegistry {
    pub fn new(policy: PathPolicy) -> Self {
        Self {
            descriptors: Capability::ALL
                .into_iter()
                .map(Capability::descriptor)
                .collect(),
            policy,
        }
    }

    pub fn descriptors(&self) -> &[CapabilityDescriptor] {
        &self.descriptors
    }

    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    pub fn validate(
        &self,
        invocation: &CapabilityInvocation,
    ) -> Result<CapabilityCall, CapabilityError> {
        let Some(capability) = Capability::from_name(&invocation.name) else {
            let available = self
                .descriptors
                .iter()
                .map(|descriptor| descriptor.name)
                .collect::<Vec<&str>>();
            return Err(CapabilityError::new(
                "unknown_capability",
                format!(
                    "unknown capability '{}'. Available capabilities: {}",
                    invocation.name,
                    available.join(", ")
                ),
            ));
        };

        let Some(args) = invocation.arguments.as_object() else {
            return Err(CapabilityError::new(
                "invalid_args",
                format!("arguments for {} must be a JSON object", capability.name()),
            ));
        };

        let path = required_string_arg(capability, args, "path")?;
        if path.trim().is_empty() {
            return Err(CapabilityError::new(
                "invalid_args",
                format!("'path' cannot be empty for {}", capability.name()),
            ));
        }
        let path = path.trim().to_string();

        Ok(match capability {
            Capability::ReadText => CapabilityCall::ReadText { path },
            Capability::ReadPdf => CapabilityCall::ReadPdf { path },
            Capability::WriteFile => CapabilityCall::WriteFile {
                path,
                content: required_string_arg(capability, args, "content")?,
            },
        })
    }

    pub fn execute(&self, call: &CapabilityCall) -> CapabilityResult {
        match call {
            CapabilityCall::ReadText { path } => read::read_text(&self.policy, path),
            CapabilityCall::ReadPdf { path } => read::read_pdf(&self.policy, path),
            CapabilityCall::WriteFile { path, content } => {
                write::write_file(&self.policy, path, content)
            }
        }
    }

    /// Validates then executes; every failure comes back as `CapabilityResult::Error`.
    pub fn invoke(&self, name: &str, args: &Value) -> CapabilityResult {
        let invocation = CapabilityInvocation::new("", name, args.clone());
        match self.validate(&invocation) {
            Ok(call) => self.execute(&call),
            Err(err) => {
                tracing::warn!(
                    capability = name,
                    code = err.code,
                    error = %err.message,
                    "Rejected capability invocation"
                );
                err.into()
            }
        }
    }
}
