//! Mkroom command - Create a top-level room or a room inside a room

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use dcbulk_core::domain::{NodeType, RemoteNode, RemotePath};
use dcbulk_core::path::{parse_base_url, parse_file_name, parse_new_path, ResolvedTarget};
use dcbulk_core::session::Session;

use super::mkdir::node_json;
use super::{Outcome, StoreArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct MkroomCommand {
    /// Room to create, e.g. dracoon.team/teamspace or dracoon.team/teamspace/projects
    pub path: String,

    /// Do not inherit the permissions of the parent room
    #[arg(long)]
    pub no_inherit_permissions: bool,

    #[command(flatten)]
    pub store: StoreArgs,
}

impl MkroomCommand {
    /// New rooms inherit their parent's permissions unless told otherwise
    pub fn inherit_permissions(&self) -> bool {
        !self.no_inherit_permissions
    }

    pub async fn execute(&self, format: OutputFormat) -> Result<Outcome> {
        let formatter = get_formatter(format);
        let parent_path = parse_new_path(&self.path)?;
        let name = parse_file_name(&self.path)?;

        let session = self.store.open_session(ResolvedTarget {
            base_url: parse_base_url(&self.path)?,
            path: parent_path.clone(),
        })?;
        let result = self.create(&session, &parent_path, &name).await;
        session.close().await.context("Failed to close session")?;
        let node = result?;

        info!(node_id = %node.id, name = %node.name, "Room created");
        match format {
            OutputFormat::Json => formatter.print_json(&node_json(&node)),
            OutputFormat::Human => formatter.success(&format!(
                "Created room {} (id {})",
                parent_path.join(&node.name)?,
                node.id
            )),
        }
        Ok(Outcome::Complete)
    }

    async fn create(
        &self,
        session: &Session,
        parent_path: &RemotePath,
        name: &str,
    ) -> Result<RemoteNode> {
        let store = session.store()?;
        let parent_id = if parent_path.is_root() {
            None
        } else {
            let parent = store
                .resolve_path_to_node(parent_path)
                .await?
                .with_context(|| format!("Parent not found: {parent_path}"))?;
            if parent.node_type != NodeType::Room {
                bail!(
                    "{parent_path} is a {}; rooms can only be created at the top level or inside a room",
                    parent.node_type
                );
            }
            Some(parent.id)
        };

        store
            .create_room(parent_id, name, self.inherit_permissions())
            .await
            .with_context(|| format!("Failed to create room {name}"))
    }
}
