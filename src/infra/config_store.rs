// ============================================================
// Layer 6 — Config Store
// ============================================================
// Saves and loads NetworkParams as pretty-printed JSON.
//
// A config file pins the exact architecture, so the same
// network can be rebuilt later:
//
//   configs/
//     fastsurfer_coronal.json
//     fastsurfer_axial.json
//
// Loading also validates the params, so a bad file fails here
// with its path in the error rather than deep inside Burn.
//
// Reference: Rust Book §9 (Error Handling with anyhow)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::params::NetworkParams;

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write params to JSON, creating parent directories as needed.
    pub fn save(&self, params: &NetworkParams) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(params)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Cannot write config to '{}'", self.path.display()))?;

        tracing::debug!("Saved network config to '{}'", self.path.display());
        Ok(())
    }

    /// Read and validate params from JSON.
    pub fn load(&self) -> Result<NetworkParams> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read config from '{}'", self.path.display()))?;

        let params: NetworkParams = serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", self.path.display()))?;

        params
            .validate()
            .with_context(|| format!("Invalid config '{}'", self.path.display()))?;
        Ok(params)
    }

    /// Load from `path` if given, else the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<NetworkParams> {
        match path {
            Some(path) => Self::new(path).load(),
            None => Ok(NetworkParams::default()),
        }
    }
}
