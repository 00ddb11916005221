use serde::{Serialize, Deserialize};
use std::path::PathBuf;

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub global: GlobalConfig,
    pub reader: ReaderConfig,
}

/// Global settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    pub verbosity: u8,
    pub data_dir: PathBuf,
    pub session_dir: PathBuf,
}

/// Multi-file reader settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReaderConfig {
    /// Worker count used when a call does not pass one; 0 means one per CPU
    pub default_pool_size: usize,
    pub has_headers: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global: GlobalConfig {
                verbosity: super::DEFAULT_VERBOSITY,
                data_dir: PathBuf::from("data"),
                session_dir: PathBuf::from("ztmp/session"),
            },
            reader: ReaderConfig {
                default_pool_size: 4,
                has_headers: true,
            },
        }
    }
}

impl ReaderConfig {
    /// Resolve the configured pool size, expanding 0 to the CPU count
    pub fn effective_pool_size(&self) -> usize {
        if self.default_pool_size == 0 {
            num_cpus::get()
        } else {
            self.default_pool_size
        }
    }
}
