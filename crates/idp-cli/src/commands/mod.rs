//! Subcommands.

pub mod batch;
pub mod config;
pub mod process;

use std::path::{Path, PathBuf};

use idp_core::{Capabilities, DocumentProcessor, IdpConfig};

/// Load the config file (or defaults) and apply environment overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<IdpConfig> {
    let mut config = match path {
        Some(path) => IdpConfig::from_file(path)?,
        None => {
            let default_path = config::default_config_path();
            if default_path.exists() {
                IdpConfig::from_file(&default_path)?
            } else {
                IdpConfig::default()
            }
        }
    };

    config.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

/// Build a processor, loading whatever model backends are available.
pub fn build_processor(mut config: IdpConfig, model_dir: Option<PathBuf>) -> DocumentProcessor {
    if let Some(dir) = model_dir {
        config.ocr.model_dir = dir;
    }

    let caps = Capabilities::load(&config);
    DocumentProcessor::new(config, caps)
}
