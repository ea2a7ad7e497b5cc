//! dcbulk Core - Domain model, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `RemoteNode`, `LocalEntry`, `TransferTask`, `BatchResult`, `KeyAssignment`
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `ICryptoProvider`, `ITransferObserver`
//! - **Path resolution** - splitting `host/path` input into target and hierarchy path
//! - **Session** - the explicit context carrying the collaborators of one run
//!
//! # Architecture
//!
//! The domain module contains pure types with no I/O. Ports define trait
//! interfaces that adapter crates implement. Orchestration lives in
//! `dcbulk-sync`, conflict decisions in `dcbulk-conflict`.

pub mod config;
pub mod domain;
pub mod path;
pub mod ports;
pub mod session;
