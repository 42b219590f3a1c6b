//! # feelsat Common Library
//!
//! Shared code for the feelsat services including:
//! - Daily readings and the `Series` container
//! - Date parsing for heterogeneous CSV sources
//! - TOML configuration loading and resolution
//! - Common error type

pub mod config;
pub mod error;
pub mod series;
pub mod time;

pub use error::{Error, Result};
pub use series::{Reading, Series, SeriesError};
