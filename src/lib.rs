//! Clipforge - WebM to MP4 conversion engine
//!
//! This library crate exposes the job engine so front ends and integration
//! tests can drive it directly.

pub mod config;
pub mod conversion;
pub mod cpu;
pub mod engine;
pub mod events;
pub mod naming;
pub mod retention;
pub mod runner;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod watch;
