//! Domain core for the phasetrack project tracker.
//!
//! This crate has no I/O. It holds the permission evaluation engine
//! ([`permission`], [`scope`]), the history lineage and privacy model
//! ([`lineage`], [`privacy`]) and the compositor that combines them into
//! the lists handed back to callers ([`visibility`]).

pub mod error;
pub mod history;
pub mod lineage;
pub mod permission;
pub mod privacy;
pub mod roles;
pub mod scope;
pub mod types;
pub mod viewer;
pub mod visibility;
