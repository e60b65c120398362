use anyhow::Result;

use crate::ingest::{ArtifactKind, ExtractionError, StagedArtifact};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    Display,
    Persist { path: String },
}

impl OutputMode {
    pub fn label(&self) -> &'static str {
        match self {
            OutputMode::Display => "display",
            OutputMode::Persist { .. } => "persist",
        }
    }
}

/// A location the model can pass to a read capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub location: String,
    pub kind: ArtifactKind,
    pub extraction_error: Option<String>,
}

impl ArtifactRef {
    pub fn new(location: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            location: location.into(),
            kind,
            extraction_error: None,
        }
    }

    pub fn with_extraction_error(mut self, reason: impl Into<String>) -> Self {
        self.extraction_error = Some(reason.into());
        self
    }
}

/// Pairs staged uploads with their ingestion failures by upload position.
///
/// `staged` must be in upload order, as `stage_artifacts` returns it.
pub fn artifact_refs(staged: &[StagedArtifact], errors: &[ExtractionError]) -> Vec<ArtifactRef> {
    staged
        .iter()
        .enumerate()
        .map(|(index, artifact)| {
            let reference = ArtifactRef::new(artifact.location.display().to_string(), artifact.kind);
            match errors.iter().find(|err| err.index == index) {
                Some(err) => reference.with_extraction_error(err.reason.clone()),
                None => reference,
            }
        })
        .collect()
}

pub fn assemble(user_text: &str, artifact_refs: &[ArtifactRef], output_mode: &OutputMode) -> String {
    let mut out = String::from(user_text);

    if !artifact_refs.is_empty() {
        out.push_str("\n\nDocuments (in submission order):\n");
        for (index, reference) in artifact_refs.iter().enumerate() {
            out.push_str(&format!(
                "{}. {} ({}; read with {})",
                index + 1,
                reference.location,
                reference.kind.label(),
                reference.kind.capability().name()
            ));
            if let Some(reason) = reference.extraction_error.as_deref() {
                out.push_str(&format!(" [extraction failed during upload: {reason}]"));
            }
            out.push('\n');
        }
    }

    if let OutputMode::Persist { path } = output_mode {
        out.push_str(&format!(
            "\nAfter summarizing, write the summary to a file named {path} using write_file."
        ));
    }

    out
}

pub fn enforce_prompt_limit(prompt: &str, max_chars: usize) -> Result<()> {
    if max_chars > 0 && prompt.len() > max_chars {
        return Err(anyhow::anyhow!(
            "prompt exceeds maximum length ({} chars > {} limit). Shorten the prompt or increase max_prompt_chars.",
            prompt.len(),
            max_chars
        ));
    }
    Ok(())
}
