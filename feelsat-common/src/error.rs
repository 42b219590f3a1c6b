//! Configuration errors shared by the feelsat binaries

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Read {} failed: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse {} failed: {source}", path.display())]
    ParseConfig {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A value is out of range or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(
        "OpenAQ API key not configured. Please configure using one of:\n\
         1. Command line: --api-key your-key-here\n\
         2. Environment: {env_var}=your-key-here\n\
         3. TOML config: [openaq] api_key = \"your-key\"\n\
         \n\
         Obtain an API key at: https://explore.openaq.org/register"
    )]
    MissingApiKey { env_var: &'static str },
}
