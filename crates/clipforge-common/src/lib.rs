//! Clipforge-Common: Shared types and utilities.
//!
//! This crate provides common functionality used across clipforge:
//!
//! - **Typed IDs**: [`JobId`], a UUID wrapper for conversion jobs
//! - **Path Utilities**: Extension checks used by the ingestion front ends
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use clipforge_common::{JobId, Error, Result};
//! use clipforge_common::paths::has_extension;
//! use std::path::Path;
//!
//! let job_id = JobId::new();
//! assert!(has_extension(Path::new("clip.WEBM"), &["webm"]));
//!
//! fn lookup(id: JobId) -> Result<()> {
//!     Err(Error::not_found(id.to_string()))
//! }
//! assert!(lookup(job_id).is_err());
//! ```

pub mod error;
pub mod ids;
pub mod paths;

pub use error::{Error, Result};
pub use ids::*;
