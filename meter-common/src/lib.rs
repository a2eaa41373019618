//! # Meter Common Library
//!
//! Shared code for the meter reading services:
//! - Bootstrap configuration (TOML) and root folder resolution
//! - Common error type
//! - Reading timestamp parsing and formatting
//! - UUID helpers

pub mod config;
pub mod error;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
