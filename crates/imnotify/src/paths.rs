use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Stores references to all the paths relevant to imnotify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImnotifyPaths {
    pub config_dir: PathBuf,
    pub ipc_socket_file: PathBuf,
}

impl ImnotifyPaths {
    pub fn from_config_dir<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref();
        if config_dir.is_file() {
            bail!("Please provide the path to the config directory, not a file within it")
        }

        let ipc_socket_file = std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
            .join("imnotify-server");

        Ok(ImnotifyPaths { config_dir: config_dir.to_path_buf(), ipc_socket_file })
    }

    pub fn default() -> Result<Self> {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".config")))
            .context("Neither XDG_CONFIG_HOME nor HOME is set")?
            .join("imnotify");

        Self::from_config_dir(config_dir)
    }

    pub fn get_ipc_socket_file(&self) -> &Path {
        self.ipc_socket_file.as_path()
    }

    pub fn get_config_file(&self) -> PathBuf {
        self.config_dir.join("imnotify.json")
    }
}

impl std::fmt::Display for ImnotifyPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "config-dir: {}, ipc-socket: {}", self.config_dir.display(), self.ipc_socket_file.display())
    }
}
