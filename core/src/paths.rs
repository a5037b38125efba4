//! Where the engine's data lives on disk.
//!
//! Linguistic data is read from the system installation; per-user adaptive
//! data goes to `~/.cache/ibus/<libpinyin|libbopomofo>`.

use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::engine::Family;

/// Read-only linguistic data installed with libpinyin.
pub const SYSTEM_DATA_DIR: &str = "/usr/share/libpinyin/data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    data_dir: PathBuf,
    /// `<home>/.cache/ibus`, absent when no home directory is known.
    cache_root: Option<PathBuf>,
}

impl StoragePaths {
    /// Resolve the user cache root from `$HOME`.
    pub fn from_env() -> Self {
        let home = std::env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(PathBuf::from);
        if home.is_none() {
            warn!("HOME is not set; user data will not be persisted");
        }
        Self {
            data_dir: PathBuf::from(SYSTEM_DATA_DIR),
            cache_root: home.map(cache_root_for),
        }
    }

    pub fn with_home<P: AsRef<Path>>(home: P) -> Self {
        Self {
            data_dir: PathBuf::from(SYSTEM_DATA_DIR),
            cache_root: Some(cache_root_for(home.as_ref())),
        }
    }

    /// Paths with no user directory at all.
    pub fn without_user_dirs() -> Self {
        Self {
            data_dir: PathBuf::from(SYSTEM_DATA_DIR),
            cache_root: None,
        }
    }

    /// Replace the system data directory, for non-standard installs.
    pub fn with_data_dir<P: Into<PathBuf>>(mut self, data_dir: P) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn user_dir(&self, family: Family) -> Option<PathBuf> {
        self.cache_root
            .as_ref()
            .map(|root| root.join(family.user_subdir()))
    }
}

fn cache_root_for<P: AsRef<Path>>(home: P) -> PathBuf {
    home.as_ref().join(".cache").join("ibus")
}

/// Create `dir` and its parents, readable by the owner only.
pub fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}
