//! Storage path resolution
//!
//! Users address the storage service with a single string that combines the
//! host and the hierarchy path, for example
//! `https://dracoon.team/teamspace/archive`. The functions here split that
//! input into the authentication target and the hierarchy path.

use serde::{Deserialize, Serialize};

use crate::domain::errors::PathParseError;
use crate::domain::newtypes::RemotePath;

const HTTPS_SCHEME: &str = "https://";

/// Authentication target and hierarchy path parsed from one input string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    /// `https://<host>`
    pub base_url: String,
    pub path: RemotePath,
}

/// Split raw input into its host and the remaining non-empty segments
fn split(raw: &str) -> Result<(&str, Vec<&str>), PathParseError> {
    let trimmed = raw.trim();
    let without_scheme = trimmed.strip_prefix(HTTPS_SCHEME).unwrap_or(trimmed);

    let Some((host, rest)) = without_scheme.split_once('/') else {
        return Err(PathParseError::new(raw, "expected <host>/<path>"));
    };
    if host.is_empty() {
        return Err(PathParseError::new(raw, "missing host"));
    }

    let segments = rest.split('/').filter(|s| !s.is_empty()).collect();
    Ok((host, segments))
}

fn to_remote_path(raw: &str, segments: &[&str]) -> Result<RemotePath, PathParseError> {
    RemotePath::new(segments.iter().copied()).map_err(|e| PathParseError::new(raw, e.to_string()))
}

/// Hierarchy path without the host; `host/` yields the root
///
/// # Errors
/// Returns `PathParseError` if the input has no path separator or no host
pub fn parse_path(raw: &str) -> Result<RemotePath, PathParseError> {
    let (_, segments) = split(raw)?;
    to_remote_path(raw, &segments)
}

/// Parent of the path's final segment, used when creating a new node
///
/// # Errors
/// Returns `PathParseError` if the input refers to the hierarchy root
pub fn parse_new_path(raw: &str) -> Result<RemotePath, PathParseError> {
    let (_, segments) = split(raw)?;
    match segments.split_last() {
        Some((_, parent)) => to_remote_path(raw, parent),
        None => Err(PathParseError::new(
            raw,
            "the hierarchy root has no parent to create a node in",
        )),
    }
}

/// Final segment of the path
///
/// # Errors
/// Returns `PathParseError` if the path is empty or its final segment is not
/// a valid name
pub fn parse_file_name(raw: &str) -> Result<String, PathParseError> {
    let (_, segments) = split(raw)?;
    let name = segments
        .last()
        .ok_or_else(|| PathParseError::new(raw, "path has no final segment"))?;
    RemotePath::check_segment(name).map_err(|e| PathParseError::new(raw, e.to_string()))?;
    Ok((*name).to_string())
}

/// `https://<host>` of the input
///
/// # Errors
/// Returns `PathParseError` if the input has no path separator or no host
pub fn parse_base_url(raw: &str) -> Result<String, PathParseError> {
    let (host, _) = split(raw)?;
    Ok(format!("{HTTPS_SCHEME}{host}"))
}

/// Parse both the base URL and the hierarchy path
///
/// # Errors
/// Returns `PathParseError` if the input has no path separator or no host
pub fn parse_target(raw: &str) -> Result<ResolvedTarget, PathParseError> {
    Ok(ResolvedTarget {
        base_url: parse_base_url(raw)?,
        path: parse_path(raw)?,
    })
}
