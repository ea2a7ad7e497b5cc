//! Mkdir command - Create a folder inside a room or folder

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use dcbulk_core::domain::{RemoteNode, RemotePath};
use dcbulk_core::path::{parse_base_url, parse_file_name, parse_new_path, ResolvedTarget};
use dcbulk_core::session::Session;

use super::{Outcome, StoreArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct MkdirCommand {
    /// Folder to create, e.g. dracoon.team/teamspace/archive/2024
    pub path: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl MkdirCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<Outcome> {
        let formatter = get_formatter(format);
        let parent_path = parse_new_path(&self.path)?;
        let name = parse_file_name(&self.path)?;
        if parent_path.is_root() {
            bail!("Folders can only be created inside a room");
        }

        let session = self.store.open_session(ResolvedTarget {
            base_url: parse_base_url(&self.path)?,
            path: parent_path.clone(),
        })?;
        let result = create(&session, &parent_path, &name).await;
        session.close().await.context("Failed to close session")?;
        let node = result?;

        info!(node_id = %node.id, name = %node.name, "Folder created");
        match format {
            OutputFormat::Json => formatter.print_json(&node_json(&node)),
            OutputFormat::Human => formatter.success(&format!(
                "Created folder {} (id {})",
                parent_path.join(&node.name)?,
                node.id
            )),
        }
        Ok(Outcome::Complete)
    }
}

async fn create(session: &Session, parent_path: &RemotePath, name: &str) -> Result<RemoteNode> {
    let store = session.store()?;
    let parent = store
        .resolve_path_to_node(parent_path)
        .await?
        .with_context(|| format!("Parent not found: {parent_path}"))?;
    if !parent.is_container() {
        bail!("{parent_path} is a {}, expected a room or folder", parent.node_type);
    }
    store
        .create_folder(parent.id, name)
        .await
        .with_context(|| format!("Failed to create folder {name} in {parent_path}"))
}

pub(crate) fn node_json(node: &RemoteNode) -> serde_json::Value {
    serde_json::json!({
        "id": node.id.as_u64(),
        "name": node.name,
        "type": node.node_type.name(),
        "parent_id": node.parent_id.map(|id| id.as_u64()),
    })
}
