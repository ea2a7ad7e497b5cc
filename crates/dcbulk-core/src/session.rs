//! Explicit session context
//!
//! A `Session` carries the collaborators an upload needs (the remote store
//! and, for encrypted destinations, the crypto provider) together with the
//! target it was opened for. Components receive it by reference and check
//! that it is still open before touching the store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::newtypes::SessionId;
use crate::path::ResolvedTarget;
use crate::ports::{ICryptoProvider, IRemoteStore, RemoteError};

/// Errors related to the session lifecycle
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} is closed")]
    Closed(SessionId),

    #[error("failed to close session: {0}")]
    Close(#[from] RemoteError),
}

/// An open connection to the storage service
pub struct Session {
    id: SessionId,
    target: ResolvedTarget,
    opened_at: DateTime<Utc>,
    store: Arc<dyn IRemoteStore>,
    crypto: Option<Arc<dyn ICryptoProvider>>,
    closed: AtomicBool,
}

impl Session {
    /// Open a session against `target`
    pub fn open(
        target: ResolvedTarget,
        store: Arc<dyn IRemoteStore>,
        crypto: Option<Arc<dyn ICryptoProvider>>,
    ) -> Self {
        let session = Self {
            id: SessionId::new(),
            target,
            opened_at: Utc::now(),
            store,
            crypto,
            closed: AtomicBool::new(false),
        };
        info!(
            session_id = %session.id,
            base_url = %session.target.base_url,
            crypto = session.crypto.is_some(),
            "Session opened"
        );
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn target(&self) -> &ResolvedTarget {
        &self.target
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// # Errors
    /// Returns `SessionError::Closed` once `close` has been called
    pub fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(SessionError::Closed(self.id))
        }
    }

    /// The remote store, if the session is still open
    pub fn store(&self) -> Result<&Arc<dyn IRemoteStore>, SessionError> {
        self.ensure_open()?;
        Ok(&self.store)
    }

    /// The crypto provider, if one was supplied and the session is open
    pub fn crypto(&self) -> Result<Option<&Arc<dyn ICryptoProvider>>, SessionError> {
        self.ensure_open()?;
        Ok(self.crypto.as_ref())
    }

    /// Close the session and release the store's credentials
    ///
    /// # Errors
    /// Returns `SessionError::Closed` if already closed, or the store's error
    /// if releasing failed (the session counts as closed either way)
    pub async fn close(&self) -> Result<(), SessionError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(SessionError::Closed(self.id));
        }
        debug!(session_id = %self.id, "Closing session");
        self.store.close().await?;
        info!(session_id = %self.id, "Session closed");
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("opened_at", &self.opened_at)
            .field("crypto", &self.crypto.is_some())
            .field("open", &self.is_open())
            .finish()
    }
}
