//! dcbulk Conflict - Name conflict resolution for bulk uploads
//!
//! Provides:
//! - The pure resolution policy (`fail`, `overwrite`, `autorename`)
//! - Deterministic `stem (n).ext` renaming
//! - A per-parent name ledger that reserves final names synchronously, so
//!   concurrent tasks in one batch never land on the same name

pub mod ledger;
pub mod namer;
pub mod policy;

pub use ledger::{NameLedger, ParentListing};
pub use namer::AutoRenamer;
pub use policy::{decide, ExistingState, PolicyAction, Rejection};
