//! Integration tests for dcbulk-sync
//!
//! Runs the replicator, scheduler, key distribution and the full upload use
//! case against an in-memory remote store and crypto provider.


mod test_keys;
mod test_scheduler;
mod test_upload;
