//! Distribute command - Equip room members that lack the room's content key

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use dcbulk_core::config::Config;
use dcbulk_core::path::parse_target;
use dcbulk_sync::keys::distribute_for_path;

use super::{Outcome, StoreArgs};
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Args)]
pub struct DistributeCommand {
    /// Room, or folder inside a room, e.g. dracoon.team/vault
    pub path: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl DistributeCommand {
    pub async fn execute(&self, format: OutputFormat, config: &Config) -> Result<Outcome> {
        let formatter = get_formatter(format);
        let target = parse_target(&self.path)?;
        let path = target.path.clone();

        let session = self.store.open_session(target)?;
        let result = distribute_for_path(&session, &path, config.keys.concurrency.max(1)).await;
        session.close().await.context("Failed to close session")?;
        let result = result.with_context(|| format!("Key distribution for {path} failed"))?;

        let Some(keys) = result else {
            match format {
                OutputFormat::Json => formatter.print_json(&serde_json::json!({
                    "path": path.to_string(),
                    "encrypted": false,
                })),
                OutputFormat::Human => {
                    formatter.success(&format!("{path} is not encrypted, nothing to distribute"));
                }
            }
            return Ok(Outcome::Complete);
        };

        info!(
            room_id = %keys.room_id,
            equipped = keys.equipped.len(),
            failed = keys.failed.len(),
            "Distribute command finished"
        );
        match format {
            OutputFormat::Json => formatter.print_json(&serde_json::json!({
                "path": path.to_string(),
                "encrypted": true,
                "room_id": keys.room_id.as_u64(),
                "equipped": keys.equipped.iter().map(|u| u.as_u64()).collect::<Vec<_>>(),
                "failed": keys.failed.iter().map(|f| serde_json::json!({
                    "user_id": f.user_id.as_u64(),
                    "cause": f.cause,
                })).collect::<Vec<_>>(),
            })),
            OutputFormat::Human => {
                formatter.success(&format!(
                    "Equipped {} in room {}",
                    plural(keys.equipped.len(), "member"),
                    keys.room_id
                ));
                for failure in &keys.failed {
                    formatter.warn(&format!("user {}: {}", failure.user_id, failure.cause));
                }
            }
        }

        Ok(if keys.is_partial() {
            Outcome::Partial
        } else {
            Outcome::Complete
        })
    }
}
