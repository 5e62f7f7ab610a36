//! # Survey Common Library
//!
//! Shared code for the audio-text matching survey backend:
//! - Error taxonomy shared by the store and the HTTP layer
//! - Configuration resolution (CLI/env, TOML file, compiled defaults)
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
