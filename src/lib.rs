//! A small tool for keeping unattended, repeatable mirrors of all the git
//! repositories an account can see on GitHub or Bitbucket.
//!
//! Each configured source is walked via its platform's listing API, and every
//! discovered repository ends up as a bare mirror under
//! `<backup_dir>/<source.directory>/[<owner>/]<name>`. Mirrors are updated
//! with a forced, pruning `git fetch`, so branches and tags track the remote
//! exactly and remotely-deleted refs disappear locally too. The access token
//! is only ever embedded in the in-memory fetch URL, never written to disk.
//!
//! The usual entry point is loading a [`Config`] and handing it to a
//! [`Driver`]:
//!
//! ```rust,no_run
//! # use failure::Error;
//! use repo_mirror::{Config, Driver};
//! # fn run() -> Result<(), Error> {
//! let cfg = Config::from_file("/etc/repo-mirror.json")?;
//! let driver = Driver::with_config(cfg);
//! driver.run(std::path::Path::new("/var/backups/git"))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod driver;
pub mod git;
pub mod names;
pub mod providers;
mod utils;

#[cfg(test)]
pub(crate) mod mockserver;

pub use crate::config::Config;
pub use crate::driver::Driver;
