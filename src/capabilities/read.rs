use std::io::ErrorKind;
use std::path::PathBuf;

use super::{CapabilityResult, PathPolicy};
use crate::ingest::{decode_text, extract_pdf_text};

fn read_bytes(policy: &PathPolicy, path: &str) -> Result<(PathBuf, Vec<u8>), CapabilityResult> {
    let resolved = policy.resolve(path).map_err(CapabilityResult::from)?;
    match std::fs::read(&resolved) {
        Ok(bytes) => Ok((resolved, bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(CapabilityResult::Error(format!(
            "Error: File '{path}' not found."
        ))),
        Err(err) => Err(CapabilityResult::Error(format!(
            "Error reading file '{path}': {err}"
        ))),
    }
}

pub fn read_text(policy: &PathPolicy, path: &str) -> CapabilityResult {
    let (resolved, bytes) = match read_bytes(policy, path) {
        Ok(read) => read,
        Err(result) => return result,
    };
    match decode_text(&bytes) {
        Ok(text) => {
            tracing::debug!(path = %resolved.display(), chars = text.len(), "read_text completed");
            CapabilityResult::Success(text)
        }
        Err(reason) => CapabilityResult::Error(format!("Error reading file '{path}': {reason}")),
    }
}

pub fn read_pdf(policy: &PathPolicy, path: &str) -> CapabilityResult {
    let (resolved, bytes) = match read_bytes(policy, path) {
        Ok(read) => read,
        Err(result) => return result,
    };
    match extract_pdf_text(&bytes) {
        Ok(text) => {
            tracing::debug!(path = %resolved.display(), chars = text.len(), "read_pdf completed");
            CapabilityResult::Success(text)
        }
        Err(reason) => CapabilityResult::Error(format!("Error reading PDF '{path}': {reason}")),
    }
}
