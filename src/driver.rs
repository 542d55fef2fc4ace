//! Ties the configured sources together and runs (optionally repeating)
//! backup passes.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use failure::Error;
use log::{info, warn};

use crate::config::{Config, Source, SourceEntry};
use crate::providers::{Bitbucket, GitHub, PassStats, Provider};

/// Runs backup passes over every configured source.
///
/// A pass visits the sources in order; a source whose discovery fails is
/// logged and skipped, and the pass carries on with the next one. With a
/// non-zero `repeat` interval the driver keeps running passes forever,
/// sleeping between them, until the process is killed or the cancel flag is
/// raised.
pub struct Driver {
    config: Config,
    cancelled: Arc<AtomicBool>,
}

impl Driver {
    pub fn with_config(config: Config) -> Driver {
        Driver {
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A flag which, once set, stops the driver at the next pass boundary
    /// (or wakes it out of the inter-pass sleep).
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn run(&self, backup_root: &Path) -> Result<(), Error> {
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                info!("Cancelled, stopping");
                return Ok(());
            }

            self.run_pass(backup_root);

            if self.config.repeat == 0 {
                return Ok(());
            }

            info!("Will repeat backup in {} minutes", self.config.repeat);
            if !self.sleep_between_passes(self.config.repeat) {
                info!("Cancelled, stopping");
                return Ok(());
            }
        }
    }

    /// Run a single pass over every source, isolating failures per source.
    pub fn run_pass(&self, backup_root: &Path) -> PassStats {
        info!("Backing up git repositories");
        let mut stats = PassStats::default();

        for entry in &self.config.repositories {
            let source = match entry {
                SourceEntry::Known(source) => source,
                SourceEntry::Unknown(raw) => {
                    warn!(
                        "Ignoring a source entry with an unrecognised or malformed type: {}",
                        raw.get("type").unwrap_or(&serde_json::Value::Null)
                    );
                    continue;
                }
            };

            let provider = provider_for(source);
            info!("Backing up from {}", provider.name());

            match provider.run(backup_root) {
                Ok(source_stats) => stats.merge(source_stats),
                Err(e) => {
                    warn!("Backing up from {} failed: {}", provider.name(), e);
                    for cause in e.iter_causes() {
                        warn!("\tCaused by: {}", cause);
                    }
                }
            }
        }

        info!(
            "Pass finished: {} mirrored, {} skipped, {} failed",
            stats.mirrored,
            stats.skipped,
            stats.failures.len()
        );
        for (name, error) in &stats.failures {
            warn!("{:?} failed: {}", name, error);
        }

        stats
    }

    /// Sleep for `minutes`, waking once a second to check the cancel flag.
    /// Returns `false` if the sleep was cancelled.
    fn sleep_between_passes(&self, minutes: u64) -> bool {
        let mut remaining = minutes * 60;

        while remaining > 0 {
            if self.cancelled.load(Ordering::SeqCst) {
                return false;
            }
            thread::sleep(Duration::from_secs(1));
            remaining -= 1;
        }

        !self.cancelled.load(Ordering::SeqCst)
    }
}

fn provider_for(source: &Source) -> Box<dyn Provider> {
    match source {
        Source::Github(cfg) => Box::new(GitHub::new(cfg.clone())),
        Source::Bitbucket(cfg) => Box::new(Bitbucket::new(cfg.clone())),
    }
}
