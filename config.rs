/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Model configuration, loadable from TOML.
//!
//! ```toml
//! space_units = "µm"
//! time_units = "min"
//! initial_capacity = 4096
//! ```
//!
//! Every key is optional.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::graph::DEFAULT_INITIAL_CAPACITY;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub space_units: String,
    pub time_units: String,
    /// Pool capacity reserved up front.
    pub initial_capacity: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            space_units: "pixel".to_string(),
            time_units: "frame".to_string(),
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl ModelConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}
