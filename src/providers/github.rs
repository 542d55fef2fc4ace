//! The GitHub-style adapter.

use std::path::Path;

use failure::{Error, ResultExt};
use log::{debug, info};
use reqwest::blocking::Client;
use serde_derive::Deserialize;

use super::{resolve_destination, PassStats, Provider};
use crate::config::GithubSource;
use crate::utils::{self, Paginated};
use crate::{git, names};

const DEFAULT_API_ROOT: &str = "https://api.github.com";

/// Mirrors every repository the configured token can see, laid out as
/// `<directory>/<owner>/<name>`.
pub struct GitHub {
    cfg: GithubSource,
    api_root: String,
}

impl GitHub {
    pub fn new(cfg: GithubSource) -> GitHub {
        GitHub {
            cfg,
            api_root: String::from(DEFAULT_API_ROOT),
        }
    }

    #[cfg(test)]
    fn with_api_root(cfg: GithubSource, api_root: &str) -> GitHub {
        GitHub {
            cfg,
            api_root: api_root.to_string(),
        }
    }

    /// Ask the API who we are. The login doubles as the username half of
    /// the fetch credentials.
    fn login(&self, client: &Client) -> Result<String, Error> {
        let user: RawUser = utils::get_json(
            client,
            &format!("{}/user", self.api_root),
            &self.cfg.token,
        )
        .context("Unable to fetch the authenticated user")?;

        Ok(user.login)
    }

    fn owner_allowed(&self, owner: &str) -> bool {
        match &self.cfg.owners {
            Some(owners) if !owners.is_empty() => owners.contains(owner),
            _ => true,
        }
    }

    /// Validate, filter and mirror a single listed repository.
    ///
    /// Name validation comes first, before anything derived from the
    /// listing is allowed near the filesystem.
    fn mirror_one(
        &self,
        raw: &RawRepo,
        login: &str,
        dest: &Path,
    ) -> Result<Outcome, Error> {
        let name = names::validate(&raw.name)?;
        let owner = names::validate(&raw.owner.login)?;

        if !self.owner_allowed(owner) {
            return Ok(Outcome::SkippedOwner);
        }

        info!("Backing up repo {}", name);
        let owner_dir = dest.join(owner);
        utils::ensure_dir(&owner_dir)?;

        let url = git::with_credentials(&raw.clone_url, login, &self.cfg.token)?;
        git::mirror(name, &url, &owner_dir)?;

        Ok(Outcome::Mirrored)
    }
}

#[derive(Debug)]
enum Outcome {
    Mirrored,
    SkippedOwner,
}

impl Provider for GitHub {
    fn name(&self) -> &str {
        "GitHub"
    }

    fn run(&self, backup_root: &Path) -> Result<PassStats, Error> {
        let dest = resolve_destination(backup_root, &self.cfg.directory)?;

        let client = utils::http_client()?;
        let login = self.login(&client)?;
        info!("Logged in as user: {}", login);

        let mut stats = PassStats::default();
        let listing = format!("{}/user/repos", self.api_root);

        for page in Paginated::<Vec<RawRepo>>::new(&client, &self.cfg.token, &listing) {
            let page = page.context("Unable to list repositories")?;
            debug!("Received a page of {} repositories", page.len());

            for raw in &page {
                let identifier = format!("{}/{}", raw.owner.login, raw.name);

                match self.mirror_one(raw, &login, &dest) {
                    Ok(Outcome::Mirrored) => stats.record_mirrored(),
                    Ok(Outcome::SkippedOwner) => {
                        stats.record_skipped(&raw.name, &raw.owner.login)
                    }
                    Err(e) => stats.record_failure(&identifier, e),
                }
            }
        }

        Ok(stats)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawUser {
    login: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawRepo {
    name: String,
    clone_url: String,
    owner: Owner,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Owner {
    login: String,
}
