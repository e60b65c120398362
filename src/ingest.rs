//! Turns uploaded documents into UTF-8 text and stages them on disk.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::capabilities::Capability;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Text,
    Pdf,
}

impl ArtifactKind {
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Text => "text",
            ArtifactKind::Pdf => "pdf",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" => Some(ArtifactKind::Text),
            "pdf" => Some(ArtifactKind::Pdf),
            _ => None,
        }
    }

    pub fn capability(self) -> Capability {
        match self {
            ArtifactKind::Text => Capability::ReadText,
            ArtifactKind::Pdf => Capability::ReadPdf,
        }
    }
}

/// A user-supplied document before extraction. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    id: String,
    payload: Vec<u8>,
    kind: ArtifactKind,
}

impl Artifact {
    pub fn new(id: impl Into<String>, payload: Vec<u8>, kind: ArtifactKind) -> Self {
        Self {
            id: id.into(),
            payload,
            kind,
        }
    }

    /// Uploads a file from disk; the kind comes from the `.txt`/`.pdf` extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let kind = ArtifactKind::from_path(path).ok_or_else(|| {
            anyhow::anyhow!(
                "unsupported file '{}': only .txt and .pdf uploads are accepted",
                path.display()
            )
        })?;
        let payload = std::fs::read(path)
            .with_context(|| format!("failed to read upload '{}'", path.display()))?;
        let id = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(id, payload, kind))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionError {
    /// Position of the artifact in the upload list; ids are not unique.
    pub index: usize,
    pub artifact_id: String,
    pub reason: String,
}

/// Extracted text keyed by artifact id, in upload order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    entries: Vec<(String, String)>,
}

impl ExtractedText {
    pub fn get(&self, artifact_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| id == artifact_id)
            .map(|(_, text)| text.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(id, text)| (id.as_str(), text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_chars(&self) -> usize {
        self.entries.iter().map(|(_, text)| text.len()).sum()
    }
}

pub fn decode_text(bytes: &[u8]) -> Result<String, String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|err| format!("content is not valid UTF-8 ({})", err.utf8_error()))
}

/// Concatenates the text of every page in page order.
///
/// A page that fails to extract is logged and skipped; only a document that
/// cannot be parsed at all is an error. Zero pages yield an empty string.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, String> {
    let document =
        lopdf::Document::load_mem(bytes).map_err(|err| format!("not a readable PDF ({err})"))?;

    let pages = document.get_pages();
    let mut text = String::new();
    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(err) => {
                tracing::warn!(
                    page = *page_number,
                    error = %err,
                    "PDF page text extraction failed; continuing with remaining pages"
                );
            }
        }
    }
    Ok(text)
}

pub fn extract_artifact(artifact: &Artifact) -> Result<String, String> {
    match artifact.kind() {
        ArtifactKind::Text => decode_text(artifact.payload()),
        ArtifactKind::Pdf => extract_pdf_text(artifact.payload()),
    }
}

/// Extracts every artifact independently; failures are recorded, never raised.
pub fn ingest(artifacts: &[Artifact]) -> (ExtractedText, Vec<ExtractionError>) {
    let mut extracted = ExtractedText::default();
    let mut errors = Vec::new();

    for (index, artifact) in artifacts.iter().enumerate() {
        match extract_artifact(artifact) {
            Ok(text) => extracted.entries.push((artifact.id().to_string(), text)),
            Err(reason) => {
                tracing::warn!(
                    artifact = artifact.id(),
                    kind = artifact.kind().label(),
                    error = %reason,
                    "Artifact extraction failed"
                );
                errors.push(ExtractionError {
                    index,
                    artifact_id: artifact.id().to_string(),
                    reason,
                });
            }
        }
    }

    (extracted, errors)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    pub artifact_id: String,
    pub kind: ArtifactKind,
    pub location: PathBuf,
}

fn staged_file_name(artifact_id: &str, index: usize, used: &mut BTreeSet<String>) -> String {
    let base = Path::new(artifact_id)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| format!("upload-{}", index + 1));

    if used.insert(base.clone()) {
        return base;
    }
    let mut prefix = index + 1;
    loop {
        let renamed = format!("{prefix}-{base}");
        if used.insert(renamed.clone()) {
            return renamed;
        }
        prefix += 1;
    }
}

/// Writes each payload under `dir` so capabilities can read it back by path.
pub fn stage_artifacts(dir: &Path, artifacts: &[Artifact]) -> Result<Vec<StagedArtifact>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create upload directory '{}'", dir.display()))?;

    let mut used = BTreeSet::<String>::new();
    let mut staged = Vec::with_capacity(artifacts.len());
    for (index, artifact) in artifacts.iter().enumerate() {
        let location = dir.join(staged_file_name(artifact.id(), index, &mut used));
        std::fs::write(&location, artifact.payload())
            .with_context(|| format!("failed to stage upload '{}'", artifact.id()))?;
        staged.push(StagedArtifact {
            artifact_id: artifact.id().to_string(),
            kind: artifact.kind(),
            location,
        });
    }

    Ok(staged)
}

pub fn format_upload_size(bytes: usize) -> String {
    let kib = bytes as f64 / 1024.0;
    if kib < 1024.0 {
        format!("{kib:.1} KB")
    } else {
        format!("{:.1} MB", kib / 1024.0)
    }
}
