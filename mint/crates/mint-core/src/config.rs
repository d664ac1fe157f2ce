//! Configuration Module - runtime tuning parameters.
//!
//! All knobs affecting scheduler and collector behavior live here. Every
//! parameter has a sensible default; embedders override fields before
//! constructing the [`crate::Runtime`].

use std::env;
use std::path::PathBuf;

/// Environment variable listing module search paths.
///
/// Colon-separated on Unix, semicolon-separated on Windows.
pub const LIBRARY_PATH_VAR: &str = "MINT_LIBRARY_PATH";

#[cfg(unix)]
const PATH_LIST_SEPARATOR: char = ':';
#[cfg(windows)]
const PATH_LIST_SEPARATOR: char = ';';

/// Main configuration for the mint runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of instructions a process executes per scheduler tick.
    ///
    /// Larger quanta reduce context-switch overhead; smaller quanta improve
    /// fairness between cooperating processes.
    ///
    /// Default: 64
    pub quantum: usize,

    /// Live data-cell count above which a mark-sweep cycle is triggered
    /// between instructions.
    ///
    /// Reference counting reclaims acyclic garbage immediately; the cycle
    /// collector only has to find reference cycles, so the threshold can be
    /// generous.
    ///
    /// Default: 4096
    pub gc_threshold: usize,

    /// Directories searched for `<dotted.path>.mn` module files.
    ///
    /// Seeded from `MINT_LIBRARY_PATH` when present.
    pub library_paths: Vec<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            quantum: 64,
            gc_threshold: 4096,
            library_paths: library_paths_from_env(),
        }
    }
}

/// Parse `MINT_LIBRARY_PATH` into a path list.
///
/// Missing or empty variable yields an empty list; the current directory is
/// always searched first by the module loader regardless.
pub fn library_paths_from_env() -> Vec<PathBuf> {
    match env::var(LIBRARY_PATH_VAR) {
        Ok(value) => value
            .split(PATH_LIST_SEPARATOR)
            .filter(|entry| !entry.is_empty())
            .map(PathBuf::from)
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quantum_is_small_and_nonzero() {
        let config = RuntimeConfig::default();
        assert!(config.quantum > 0);
        assert!(config.quantum <= 1024);
    }

    #[test]
    fn default_threshold_is_nonzero() {
        assert!(RuntimeConfig::default().gc_threshold > 0);
    }
}
