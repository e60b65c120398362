use super::{CapabilityResult, PathPolicy};

/// Overwrites `path` with `content`, creating missing parent directories.
pub fn write_file(policy: &PathPolicy, path: &str, content: &str) -> CapabilityResult {
    let resolved = match policy.resolve(path) {
        Ok(resolved) => resolved,
        Err(err) => return err.into(),
    };

    if let Some(parent) = resolved.parent()
        && !parent.as_os_str().is_empty()
        && let Err(err) = std::fs::create_dir_all(parent)
    {
        return CapabilityResult::Error(format!(
            "Error writing to file: failed to create parent directories for '{path}': {err}"
        ));
    }

    match std::fs::write(&resolved, content.as_bytes()) {
        Ok(()) => {
            tracing::info!(path = %resolved.display(), bytes = content.len(), "write_file completed");
            CapabilityResult::Success(format!(
                "File '{}' written successfully.",
                resolved.display()
            ))
        }
        Err(err) => CapabilityResult::Error(format!("Error writing to file '{path}': {err}")),
    }
}
