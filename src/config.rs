//! Reconstruction settings, loadable from a JSON file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MrResult;

/// Where acquisition containers keep their readouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StorageScheme {
    /// Readouts live in a dataset file; scratch results go to
    /// temporary files that are removed when their container drops.
    #[default]
    File,
    /// Readouts are held in memory.
    Memory,
}

fn default_smoothness() -> u32 {
    1
}

/// Settings shared by containers and the coil estimators.
///
/// ## Example
///
/// ```rust, ignore
/// // { "storage_scheme": "Memory", "csm_smoothness": 3, "verbose": true }
/// let config = ReconConfig::from_json_file("recon.json")?;
/// let csms = CoilSensitivities::new(config.csm_smoothness);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconConfig {
    #[serde(default)]
    pub storage_scheme : StorageScheme,
    /// Directory for temporary acquisition files. `None` means the OS
    /// temp dir.
    #[serde(default)]
    pub scratch_dir : Option<PathBuf>,
    /// Number of smoothing passes of the coil sensitivity estimator.
    #[serde(default = "default_smoothness")]
    pub csm_smoothness : u32,
    /// Print `[tag] ...` progress lines to stderr.
    #[serde(default)]
    pub verbose : bool,
}

impl Default for ReconConfig {
    fn default() -> Self {
        ReconConfig {
            storage_scheme : StorageScheme::default(),
            scratch_dir : None,
            csm_smoothness : default_smoothness(),
            verbose : false,
        }
    }
}

impl ReconConfig {
    pub fn from_json_str(text : &str) -> MrResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file<P : AsRef<Path>>(path : P) -> MrResult<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn with_scheme(mut self, scheme : StorageScheme) -> Self {
        self.storage_scheme = scheme;
        self
    }

    pub fn with_verbose(mut self, verbose : bool) -> Self {
        self.verbose = verbose;
        self
    }
}
