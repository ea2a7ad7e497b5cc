//! Upload command - Push a file or directory tree into a room or folder
//!
//! Provides the `dcbulk upload` CLI command which:
//! 1. Parses the target and opens a session
//! 2. Picks the resolution strategy and velocity (flags over configuration)
//! 3. Runs the upload use case and prints the report

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use dcbulk_core::config::Config;
use dcbulk_core::domain::{ResolutionStrategy, TaskFailure, Velocity};
use dcbulk_core::path::parse_target;
use dcbulk_sync::engine::{UploadOptions, UploadReport, UploadRequest, UploadUseCase};

use super::{Outcome, StoreArgs};
use crate::output::{get_formatter, plural, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct UploadCommand {
    /// Local file or directory
    pub source: PathBuf,

    /// Destination room or folder, e.g. dracoon.team/teamspace/archive
    pub target: String,

    /// Upload a directory with everything below it
    #[arg(short, long)]
    pub recursive: bool,

    /// Replace files that already exist
    #[arg(long, conflicts_with = "auto_rename")]
    pub overwrite: bool,

    /// Upload under a new name when a file already exists
    #[arg(long)]
    pub auto_rename: bool,

    /// Number of simultaneous uploads: low, normal, high (or 1, 2, 3)
    #[arg(long)]
    pub velocity: Option<Velocity>,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl UploadCommand {
    fn strategy(&self, config: &Config) -> Result<ResolutionStrategy> {
        if self.overwrite {
            return Ok(ResolutionStrategy::Overwrite);
        }
        if self.auto_rename {
            return Ok(ResolutionStrategy::Autorename);
        }
        config
            .transfer
            .strategy()
            .context("Invalid transfer.default_strategy")
    }

    fn velocity(&self, config: &Config) -> Result<Velocity> {
        match self.velocity {
            Some(velocity) => Ok(velocity),
            None => config
                .transfer
                .velocity()
                .context("Invalid transfer.velocity"),
        }
    }

    pub async fn execute(
        &self,
        format: OutputFormat,
        config: &Config,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let formatter = get_formatter(format);
        let target = parse_target(&self.target)?;
        let request = UploadRequest {
            source: self.source.clone(),
            destination: target.path.clone(),
            strategy: self.strategy(config)?,
            velocity: self.velocity(config)?,
            recursive: self.recursive,
        };

        let session = self.store.open_session(target)?;
        let use_case = UploadUseCase::new(UploadOptions::from_config(config));
        let result = use_case.execute(&session, request, cancel).await;
        session.close().await.context("Failed to close session")?;

        let report = result
            .with_context(|| format!("Upload of {} failed", self.source.display()))?;
        info!(
            session_id = %session.id(),
            has_failures = report.has_failures(),
            "Upload command finished"
        );

        match format {
            OutputFormat::Json => formatter.print_json(&report_json(&report)),
            OutputFormat::Human => print_report(formatter.as_ref(), &report),
        }

        Ok(if report.has_failures() {
            Outcome::Partial
        } else {
            Outcome::Complete
        })
    }
}

fn failure_json(path: String, cause: &TaskFailure) -> serde_json::Value {
    serde_json::json!({
        "path": path,
        "code": cause.code(),
        "message": cause.to_string(),
    })
}

fn report_json(report: &UploadReport) -> serde_json::Value {
    let batch = &report.batch;
    serde_json::json!({
        "destination": {
            "id": report.destination.id.as_u64(),
            "name": report.destination.name,
            "type": report.destination.node_type.name(),
        },
        "uploaded": batch.uploaded.iter().map(|u| serde_json::json!({
            "path": u.task.local_entry().display_path(),
            "node_id": u.node.id.as_u64(),
            "name": u.node.name,
            "size": u.node.size,
        })).collect::<Vec<_>>(),
        "failed": batch.failures.iter()
            .map(|f| failure_json(f.task.local_entry().display_path(), &f.cause))
            .collect::<Vec<_>>(),
        "skipped": batch.skipped_entries.iter()
            .map(|s| failure_json(s.entry.display_path(), &s.cause))
            .collect::<Vec<_>>(),
        "folders": report.folders.as_ref().map(|f| serde_json::json!({
            "created": f.created,
            "reused": f.reused,
            "blocked": f.blocked.iter()
                .map(|(path, cause)| failure_json(path.clone(), cause))
                .collect::<Vec<_>>(),
        })),
        "keys": report.keys.as_ref().map(|k| serde_json::json!({
            "room_id": k.room_id.as_u64(),
            "equipped": k.equipped.iter().map(|u| u.as_u64()).collect::<Vec<_>>(),
            "failed": k.failed.iter().map(|f| serde_json::json!({
                "user_id": f.user_id.as_u64(),
                "cause": f.cause,
            })).collect::<Vec<_>>(),
        })),
        "key_error": report.key_error.as_ref().map(ToString::to_string),
        "walk_errors": report.walk_errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "bytes_uploaded": batch.bytes_uploaded(),
        "duration_ms": batch.duration().map(|d| d.num_milliseconds()),
        "cancelled": report.cancelled,
    })
}

fn print_report(formatter: &dyn OutputFormatter, report: &UploadReport) {
    let batch = &report.batch;
    let duration = batch
        .duration()
        .map(|d| d.num_milliseconds())
        .unwrap_or_default();
    let duration_display = if duration >= 1000 {
        format!("{:.1}s", duration as f64 / 1000.0)
    } else {
        format!("{duration}ms")
    };

    if report.cancelled {
        formatter.warn("Upload cancelled; remaining files were skipped");
    }
    formatter.success(&format!(
        "Uploaded {} ({} bytes) to {} in {}",
        plural(batch.succeeded(), "file"),
        batch.bytes_uploaded(),
        report.destination.name,
        duration_display
    ));

    if let Some(folders) = &report.folders {
        formatter.info(&format!(
            "Folders:  {} created, {} reused",
            folders.created, folders.reused
        ));
        for (path, cause) in &folders.blocked {
            formatter.warn(&format!("{path}: {cause}"));
        }
    }
    for failure in &batch.failures {
        formatter.warn(&format!(
            "{}: {}",
            failure.task.local_entry().display_path(),
            failure.cause
        ));
    }
    if batch.skipped() > 0 {
        formatter.info(&format!("Skipped:  {}", plural(batch.skipped(), "file")));
    }
    for error in &report.walk_errors {
        formatter.warn(&error.to_string());
    }

    if let Some(keys) = &report.keys {
        formatter.info(&format!(
            "Keys:     {} equipped",
            plural(keys.equipped.len(), "member")
        ));
        for failure in &keys.failed {
            formatter.warn(&format!("user {}: {}", failure.user_id, failure.cause));
        }
    }
    if let Some(error) = &report.key_error {
        formatter.warn(&format!("Keys were not distributed: {error}"));
    }

    if report.has_failures() {
        formatter.error(&format!(
            "{} failed",
            plural(batch.failed() + batch.skipped(), "file")
        ));
    }
}
