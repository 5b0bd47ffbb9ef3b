//! Core library for SMIG, the Bitbucket Server to Bitbucket Cloud
//! migration toolkit.
//!
//! The migration pipeline is built from a small set of primitives:
//! - [`api`] — blocking clients for the two REST APIs, with pagination
//!   handled at the fetch boundary and records parsed into typed structs.
//! - [`reconcile`] — joins the two inventories on normalized keys.
//! - [`permissions`] — the finite Server-to-Cloud permission lookup.
//! - [`git`] — clone / second-remote / LFS mirroring of one repository.
//! - [`rewrite`] — in-tree URL reference rewriting with commit-if-dirty.
//! - [`interchange`] — the CSV files that are the sole persistent state.
//!
//! Every primitive is idempotent: re-running a whole migration stage after
//! a partial failure is the supported retry mechanism.

pub mod api;
pub mod config;
pub mod errors;
pub mod git;
pub mod interchange;
pub mod normalize;
pub mod permissions;
pub mod reconcile;
pub mod rewrite;
pub mod types;

pub use config::MigrationConfig;
pub use errors::{ApplyOutcome, MigrateError, Result};
