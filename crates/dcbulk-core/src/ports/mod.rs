//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the orchestration code
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Storage service hierarchy and uploads
//! - [`ICryptoProvider`] - Room keys and per-user key records
//! - [`ITransferObserver`] - Upload progress callbacks

pub mod crypto_provider;
pub mod observer;
pub mod remote_store;

pub use crypto_provider::{CryptoError, ICryptoProvider};
pub use observer::{ITransferObserver, TracingObserver};
pub use remote_store::{IRemoteStore, Page, RemoteError, UploadAction};
