//! Ls command - List the children of a room or folder, or the top-level rooms

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use dcbulk_core::config::Config;
use dcbulk_core::domain::{RemoteNode, RemotePath};
use dcbulk_core::path::parse_target;
use dcbulk_core::session::Session;

use super::mkdir::node_json;
use super::{Outcome, StoreArgs};
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Args)]
pub struct LsCommand {
    /// Room or folder to list, e.g. dracoon.team/teamspace; dracoon.team/ lists rooms
    pub path: String,

    /// Show type, size and node id
    #[arg(short, long)]
    pub long: bool,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl LsCommand {
    pub async fn execute(&self, format: OutputFormat, config: &Config) -> Result<Outcome> {
        let formatter = get_formatter(format);
        let target = parse_target(&self.path)?;
        let path = target.path.clone();

        let session = self.store.open_session(target)?;
        let result = list(&session, &path, config.transfer.listing_page_size).await;
        session.close().await.context("Failed to close session")?;
        let nodes = result?;

        info!(path = %path, entries = nodes.len(), "Listing finished");
        match format {
            OutputFormat::Json => formatter.print_json(&serde_json::Value::Array(
                nodes.iter().map(node_json).collect(),
            )),
            OutputFormat::Human => {
                for node in &nodes {
                    formatter.info(&self.line(node));
                }
                formatter.success(&format!("{} in {path}", plural(nodes.len(), "node")));
            }
        }
        Ok(Outcome::Complete)
    }

    fn line(&self, node: &RemoteNode) -> String {
        if !self.long {
            return node.name.clone();
        }
        format!(
            "{:<6} {:>12} {:>8}  {}",
            node.node_type.name(),
            node.size,
            node.id,
            node.name
        )
    }
}

async fn list(session: &Session, path: &RemotePath, page_size: usize) -> Result<Vec<RemoteNode>> {
    let store = session.store()?;
    if path.is_root() {
        return store
            .list_all_root(page_size)
            .await
            .context("Failed to list rooms");
    }
    let node = store
        .resolve_path_to_node(path)
        .await?
        .with_context(|| format!("Node not found: {path}"))?;
    if !node.is_container() {
        bail!("{path} is a {}, expected a room or folder", node.node_type);
    }
    store
        .list_all_children(node.id, page_size)
        .await
        .with_context(|| format!("Failed to list {path}"))
}
