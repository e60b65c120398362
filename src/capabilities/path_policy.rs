use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

use super::CapabilityError;

pub const DENIED_SEGMENTS: &[&str] = &[".git"];
pub const DENIED_FILE_NAMES: &[&str] =
    &[".env", ".env.local", ".env.development", ".env.production"];

/// Which filesystem paths capability invocations may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPolicy {
    /// Paths must resolve inside `root`; relative paths are joined onto it.
    Workspace { root: PathBuf },
    /// Paths are used as given, relative to the process directory.
    Unrestricted,
}

impl PathPolicy {
    pub fn workspace(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let canonical = root.canonicalize().with_context(|| {
            format!("failed to canonicalize workspace root '{}'", root.display())
        })?;
        Ok(PathPolicy::Workspace { root: canonical })
    }

    pub fn label(&self) -> &'static str {
        match self {
            PathPolicy::Workspace { .. } => "workspace",
            PathPolicy::Unrestricted => "unrestricted",
        }
    }

    pub fn resolve(&self, requested_path: &str) -> Result<PathBuf, CapabilityError> {
        match self {
            PathPolicy::Unrestricted => Ok(PathBuf::from(requested_path)),
            PathPolicy::Workspace { root } => {
                let resolved = normalize_against_root(root, requested_path)?;
                enforce_workspace_policy(requested_path, &resolved, root)?;
                Ok(resolved)
            }
        }
    }
}

/// Resolves `requested_path` through its deepest existing ancestor so that
/// symlinks and `..` inside the existing part are collapsed.
pub fn normalize_against_root(
    root: &Path,
    requested_path: &str,
) -> Result<PathBuf, CapabilityError> {
    let requested = PathBuf::from(requested_path);
    let absolute = if requested.is_absolute() {
        requested
    } else {
        root.join(requested)
    };

    let mut existing = absolute.as_path();
    while !existing.exists() {
        existing = existing.parent().ok_or_else(|| {
            CapabilityError::new(
                "invalid_path",
                format!("path '{}' has no resolvable parent", requested_path),
            )
        })?;
    }

    let canonical_existing = existing.canonicalize().map_err(|_| {
        CapabilityError::new(
            "invalid_path",
            format!("path '{}' could not be resolved", requested_path),
        )
    })?;
    let suffix = absolute.strip_prefix(existing).map_err(|_| {
        CapabilityError::new(
            "invalid_path",
            format!("path '{}' could not be normalized", requested_path),
        )
    })?;

    // The missing tail cannot be canonicalized, so `..` there would escape unchecked.
    if suffix
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(CapabilityError::new(
            "denied_path",
            format!(
                "path '{}' climbs out of a directory that does not exist yet",
                requested_path
            ),
        ));
    }

    if suffix.as_os_str().is_empty() {
        return Ok(canonical_existing);
    }

    Ok(canonical_existing.join(suffix))
}

pub fn enforce_workspace_policy(
    requested_path: &str,
    resolved: &Path,
    root: &Path,
) -> Result<(), CapabilityError> {
    if !resolved.starts_with(root) {
        return Err(CapabilityError::new(
            "denied_path",
            format!(
                "path '{}' is outside workspace root '{}'",
                requested_path,
                root.display()
            ),
        ));
    }

    for component in resolved.components() {
        let segment = component.as_os_str().to_string_lossy();
        if DENIED_SEGMENTS
            .iter()
            .any(|denied| segment.eq_ignore_ascii_case(denied))
        {
            return Err(CapabilityError::new(
                "denied_path",
                format!(
                    "path '{}': segment '{}' is blocked by policy",
                    requested_path, segment
                ),
            ));
        }
    }

    if let Some(name) = resolved.file_name().and_then(|value| value.to_str())
        && DENIED_FILE_NAMES
            .iter()
            .any(|denied| name.eq_ignore_ascii_case(denied))
    {
        return Err(CapabilityError::new(
            "denied_path",
            format!(
                "path '{}': filename '{}' is blocked by policy",
                requested_path, name
            ),
        ));
    }

    Ok(())
}
