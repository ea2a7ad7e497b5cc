//! Rm command - Delete a file, folder or room

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use dcbulk_core::domain::{RemoteNode, RemotePath};
use dcbulk_core::path::parse_target;
use dcbulk_core::session::Session;

use super::mkdir::node_json;
use super::{Outcome, StoreArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct RmCommand {
    /// Node to delete, e.g. dracoon.team/teamspace/archive/old.pdf
    pub path: String,

    /// Required to delete a room or folder with everything below it
    #[arg(short, long)]
    pub recursive: bool,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl RmCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<Outcome> {
        let formatter = get_formatter(format);
        let target = parse_target(&self.path)?;
        let path = target.path.clone();
        if path.is_root() {
            bail!("The hierarchy root cannot be deleted");
        }

        let session = self.store.open_session(target)?;
        let result = self.delete(&session, &path).await;
        session.close().await.context("Failed to close session")?;
        let node = result?;

        info!(node_id = %node.id, path = %path, "Node deleted");
        match format {
            OutputFormat::Json => formatter.print_json(&node_json(&node)),
            OutputFormat::Human => formatter.success(&format!(
                "Deleted {} {path} (id {})",
                node.node_type, node.id
            )),
        }
        Ok(Outcome::Complete)
    }

    async fn delete(&self, session: &Session, path: &RemotePath) -> Result<RemoteNode> {
        let store = session.store()?;
        let node = store
            .resolve_path_to_node(path)
            .await?
            .with_context(|| format!("Node not found: {path}"))?;
        if node.is_container() && !self.recursive {
            bail!("{path} is a {}; use --recursive to delete it", node.node_type);
        }
        store
            .delete_node(node.id)
            .await
            .with_context(|| format!("Failed to delete {path}"))?;
        Ok(node)
    }
}
