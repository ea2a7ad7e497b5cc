//! CLI command implementations
//!
//! Each command opens a session against a directory-backed store, runs,
//! and closes the session again.

pub mod distribute;
pub mod ls;
pub mod mkdir;
pub mod mkroom;
pub mod rm;
pub mod upload;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use dcbulk_core::path::ResolvedTarget;
use dcbulk_core::session::Session;
use dcbulk_sync::mirror::MirrorStore;

/// How a command that ran to completion ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Complete,
    /// Some files, folders or key records failed
    Partial,
}

impl Outcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Complete => ExitCode::SUCCESS,
            Outcome::Partial => ExitCode::from(2),
        }
    }
}

/// Location of the directory-backed store
#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Directory holding the room hierarchy
    #[arg(long, value_name = "DIR")]
    pub store_root: PathBuf,
}

impl StoreArgs {
    /// Open a session for `target` over the store directory
    pub fn open_session(&self, target: ResolvedTarget) -> Result<Session> {
        let store = MirrorStore::open(&self.store_root).with_context(|| {
            format!("Failed to open store at {}", self.store_root.display())
        })?;
        Ok(Session::open(target, Arc::new(store), None))
    }
}
