//! Path validation for the file tools.
//!
//! Keeps file tools inside the configured roots and away from forbidden
//! paths (e.g., ~/.ssh, /etc). This is a policy check, not a sandbox.

use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' is outside allowed roots")]
    OutsideAllowedRoots { path: String },

    #[error("Path '{path}' matches forbidden path '{pattern}'")]
    ForbiddenPath { path: String, pattern: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Failed to resolve path '{path}': {reason}")]
    ResolveFailed { path: String, reason: String },
}

/// Validate that a path is safe to access.
///
/// Checks:
/// 1. No `..` components
/// 2. The path is resolved through its nearest existing ancestor, so
///    symlinks in the existing part are followed
/// 3. The resolved path is under one of `allowed_roots` (if any)
/// 4. The resolved path is not under any of `forbidden_paths`
///
/// Returns the resolved path on success.
pub fn validate_path(
    path: &str,
    allowed_roots: &[PathBuf],
    forbidden_paths: &[PathBuf],
) -> Result<PathBuf, PathValidationError> {
    let input = Path::new(path);

    if input.components().any(|c| c == Component::ParentDir) {
        return Err(PathValidationError::PathTraversal { path: path.into() });
    }

    let resolved = resolve(input).map_err(|e| PathValidationError::ResolveFailed {
        path: path.into(),
        reason: e.to_string(),
    })?;

    for forbidden in forbidden_paths {
        if resolved.starts_with(normalize(forbidden)) {
            return Err(PathValidationError::ForbiddenPath {
                path: path.into(),
                pattern: forbidden.display().to_string(),
            });
        }
    }

    if !allowed_roots.is_empty()
        && !allowed_roots
            .iter()
            .any(|root| resolved.starts_with(normalize(root)))
    {
        return Err(PathValidationError::OutsideAllowedRoots { path: path.into() });
    }

    Ok(resolved)
}

/// Canonicalize the longest existing prefix and re-attach the rest.
fn resolve(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();

    loop {
        let candidate = if existing.as_os_str().is_empty() {
            Path::new(".")
        } else {
            existing
        };
        if candidate.exists() {
            let mut resolved = candidate.canonicalize()?;
            for part in missing.iter().rev() {
                resolved.push(part);
            }
            return Ok(resolved);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(path.to_path_buf()),
        }
    }
}

fn normalize(configured: &Path) -> PathBuf {
    let expanded = expand_tilde(configured);
    resolve(&expanded).unwrap_or(expanded)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}
