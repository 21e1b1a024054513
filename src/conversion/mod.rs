//! Media conversion.
//!
//! A job is converted by trying strategies in order:
//!
//! - **primary**: fast x264 encode that copies audio, runs niced, and streams
//!   `-progress` output so the job's percentage can be tracked
//! - **fallback**: slower encode that re-encodes audio to AAC, for inputs
//!   whose audio cannot be copied into MP4
//!
//! The whole sequence is bounded by one deadline. When it expires the running
//! encoder is killed and the job fails with a timeout.

mod executor;
mod profile;
mod strategy;

pub use executor::{ConversionError, ConversionExecutor, ConversionOutcome, DEFAULT_DEADLINE};
pub use profile::{FallbackProfile, PrimaryProfile};
pub use strategy::{
    ConversionContext, ConversionStrategy, FallbackStrategy, PrimaryStrategy, ProgressFn,
};
