//! Platform adapters: discovery of remote repositories and driving the
//! mirror for each of them.

use std::path::{Path, PathBuf};

use failure::Error;
use log::{info, warn};

mod bitbucket;
mod github;

pub use self::bitbucket::Bitbucket;
pub use self::github::GitHub;

/// Something which can discover an account's repositories and mirror them
/// under the backup root.
pub trait Provider {
    fn name(&self) -> &str;

    /// Run one backup pass for this source. Individual repositories which
    /// fail to validate or mirror are recorded in the returned stats; an
    /// `Err` means discovery itself failed and nothing more will happen for
    /// this source.
    fn run(&self, backup_root: &Path) -> Result<PassStats, Error>;
}

/// What happened to the repositories of one pass.
#[derive(Debug, Default)]
pub struct PassStats {
    pub mirrored: usize,
    /// Repositories skipped by the owners allow-list.
    pub skipped: usize,
    pub failures: Vec<(String, Error)>,
}

impl PassStats {
    pub(crate) fn record_mirrored(&mut self) {
        self.mirrored += 1;
    }

    pub(crate) fn record_skipped(&mut self, name: &str, owner: &str) {
        info!("Repo {} with owner {} not backed up", name, owner);
        self.skipped += 1;
    }

    pub(crate) fn record_failure(&mut self, name: &str, error: Error) {
        warn!("Skipping {:?}: {}", name, error);
        self.failures.push((name.to_string(), error));
    }

    pub fn merge(&mut self, other: PassStats) {
        self.mirrored += other.mirrored;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
    }
}

/// Expand `~` in a source's directory, join it onto the backup root and make
/// sure it exists.
pub(crate) fn resolve_destination(backup_root: &Path, directory: &str) -> Result<PathBuf, Error> {
    let expanded = shellexpand::tilde(directory);
    let dest = backup_root.join(expanded.as_ref());

    if crate::utils::ensure_dir(&dest)? {
        info!("Created directory {}", dest.display());
    }

    Ok(dest)
}
