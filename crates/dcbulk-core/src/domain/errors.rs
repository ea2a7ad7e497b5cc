//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures, invalid state transitions, and path errors.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote path segment
    #[error("Invalid path segment: {0}")]
    InvalidSegment(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Unknown resolution strategy name
    #[error("Invalid resolution strategy: {0}")]
    InvalidStrategy(String),

    /// Unknown velocity level
    #[error("Invalid velocity: {0}")]
    InvalidVelocity(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

/// Error raised when a combined host+path string cannot be interpreted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid storage path '{input}': {reason}")]
pub struct PathParseError {
    /// The raw input that failed to parse
    pub input: String,
    /// Why it was rejected
    pub reason: String,
}

impl PathParseError {
    pub fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
