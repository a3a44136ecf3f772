// src/config/mod.rs
mod models;

pub use models::*;

use ::config::{Environment, File, FileFormat};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

const ENV_PREFIX: &str = "APP";

/// Load configuration from a file (YAML or JSON), overlaid with `APP__*`
/// environment variables. A missing file yields defaults plus environment.
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let mut builder = ::config::Config::builder();

    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let format = match path.extension().and_then(|s| s.to_str()) {
                Some("yaml") | Some("yml") => FileFormat::Yaml,
                _ => FileFormat::Json,
            };
            builder = builder.add_source(File::from_str(&contents, format));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, using defaults");
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read config file {}", path.display()))
        }
    }

    let config: Config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to assemble configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    config.validate()?;
    Ok(config)
}
