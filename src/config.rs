//! Runtime configuration. There is exactly one tunable — where `#include`
//! searches for files it can't find relative to the current directory —
//! so this is a small struct rather than a config-file format.

use std::path::PathBuf;

/// The environment variable the original source reads via `getenv`
/// (`main.c`: `if (!(libdir = getenv("BERTRAND"))) libdir = LIBDIR;`).
pub const LIBRARY_PATH_VAR: &str = "BERTRAND_LIBRARY_PATH";

/// Compile-time fallback for the library search path, standing in for
/// the original's `#define LIBDIR "/usr/lib/local/bertrand/"`.
pub const DEFAULT_LIBRARY_DIR: &str = "/usr/local/lib/bertrand";

#[derive(Debug, Clone)]
pub struct Config {
    /// Last-resort search location for `#include path`.
    pub library_path: PathBuf,
    /// Equivalent to a leading `#trace` directive.
    pub trace: bool,
    /// Equivalent to `#quiet`: suppresses the walker's "fired rule" log line.
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            library_path: Config::library_path_from_env(),
            trace: false,
            quiet: false,
        }
    }
}

impl Config {
    fn library_path_from_env() -> PathBuf {
        std::env::var_os(LIBRARY_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LIBRARY_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_falls_back_to_compile_time_constant() {
        std::env::remove_var(LIBRARY_PATH_VAR);
        let config = Config::default();
        assert_eq!(config.library_path, PathBuf::from(DEFAULT_LIBRARY_DIR));
    }
}
