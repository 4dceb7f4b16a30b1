//! Pidfile written while the daemon runs

use log::{info, warn};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Holds the daemon's pid on disk, removing the file on drop
#[derive(Debug)]
pub struct Pidfile {
    path: PathBuf,
}

impl Pidfile {
    pub fn create(path: &Path) -> io::Result<Self> {
        info!("Creating pidfile {}", path.display());

        if let Ok(old) = fs::read_to_string(path) {
            warn!(
                "Already found a pidfile for amdfan. Old PID was: {}",
                old.trim()
            );
        }

        let pid = std::process::id();
        fs::write(path, pid.to_string())?;
        info!("Saved pidfile with running pid={}", pid);

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Pidfile {
    fn drop(&mut self) {
        if self.path.is_file() {
            let _ = fs::remove_file(&self.path);
        }
    }
}
