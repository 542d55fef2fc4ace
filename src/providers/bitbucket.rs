//! The Bitbucket-style adapter.
//!
//! Bitbucket's listing doesn't use `Link` headers; each page embeds a `next`
//! URL in the body instead, and authentication is HTTP basic with an app
//! password.

use std::path::Path;

use failure::{Error, Fail, ResultExt};
use log::{debug, info};
use reqwest::blocking::Client;
use serde_derive::Deserialize;

use super::{resolve_destination, PassStats, Provider};
use crate::config::BitbucketSource;
use crate::utils::{self, RunawayPagination, MAX_PAGES};
use crate::{git, names};

const DEFAULT_API_ROOT: &str = "https://api.bitbucket.org/2.0";

/// Mirrors every repository in the configured workspace, laid out as
/// `<directory>/<name>`.
pub struct Bitbucket {
    cfg: BitbucketSource,
    api_root: String,
}

impl Bitbucket {
    pub fn new(cfg: BitbucketSource) -> Bitbucket {
        Bitbucket {
            cfg,
            api_root: String::from(DEFAULT_API_ROOT),
        }
    }

    #[cfg(test)]
    fn with_api_root(cfg: BitbucketSource, api_root: &str) -> Bitbucket {
        Bitbucket {
            cfg,
            api_root: api_root.to_string(),
        }
    }

    fn get_listing(&self, client: &Client, url: &str) -> Result<RepoListing, Error> {
        debug!("Sending request to {}", url);

        let response = client
            .get(url)
            .basic_auth(&self.cfg.user, Some(&self.cfg.token))
            .send()
            .context("Unable to send the request")?;

        let status = response.status();
        debug!("Received response ({})", status);

        if !status.is_success() {
            let err = utils::FailedRequest {
                status,
                url: url.to_string(),
            };
            return Err(err.into());
        }

        let listing = response
            .json()
            .context("Unable to deserialize the repository listing")?;

        Ok(listing)
    }

    fn mirror_one(&self, raw: &RawRepo, dest: &Path) -> Result<(), Error> {
        let name = names::validate(&raw.name)?;

        // The browse link is the closest thing to a clone URL the listing
        // gives us; git follows the redirect to the real repository.
        let browse_url = raw
            .links
            .html
            .as_ref()
            .map(|link| link.href.as_str())
            .ok_or_else(|| MissingBrowseLink {
                name: name.to_string(),
            })?;

        info!("Backing up repo {}", name);
        let url = git::with_credentials(browse_url, &self.cfg.user, &self.cfg.token)?;
        git::mirror(name, &url, dest)?;

        Ok(())
    }
}

impl Provider for Bitbucket {
    fn name(&self) -> &str {
        "Bitbucket"
    }

    fn run(&self, backup_root: &Path) -> Result<PassStats, Error> {
        let dest = resolve_destination(backup_root, &self.cfg.directory)?;
        let client = utils::http_client()?;

        let mut stats = PassStats::default();
        let mut next = Some(format!(
            "{}/repositories/{}?pagelen=100",
            self.api_root, self.cfg.workspace
        ));
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages >= MAX_PAGES {
                return Err(RunawayPagination { pages }.into());
            }

            let listing = self
                .get_listing(&client, &url)
                .context("Unable to list the workspace's repositories")?;
            pages += 1;
            debug!("Received a page of {} repositories", listing.values.len());

            for raw in &listing.values {
                if let Err(e) = self.mirror_one(raw, &dest) {
                    stats.record_failure(&raw.name, e);
                } else {
                    stats.record_mirrored();
                }
            }

            next = listing.next;
        }

        Ok(stats)
    }
}

/// A listed repository carried no browse link to clone from.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "Repo {} has no browse link", name)]
struct MissingBrowseLink {
    name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RepoListing {
    values: Vec<RawRepo>,
    next: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawRepo {
    name: String,
    links: Links,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Links {
    html: Option<Href>,
}

#[derive(Debug, Clone, Deserialize)]
struct Href {
    href: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mockserver::{MockResponse, MockServer};

    fn source() -> BitbucketSource {
        BitbucketSource {
            token: String::from("APP-PASSWORD"),
            directory: String::from("bitbucket"),
            user: String::from("alice"),
            workspace: String::from("team"),
        }
    }

    #[test]
    fn the_listing_shape_parses() {
        let raw = r#"{
            "values": [
                {"name": "site", "links": {"html": {"href": "https://bitbucket.org/team/site"}}}
            ],
            "next": "https://api.bitbucket.org/2.0/repositories/team?pagelen=100&page=2"
        }"#;

        let listing: RepoListing = serde_json::from_str(raw).unwrap();

        assert_eq!(listing.values.len(), 1);
        assert_eq!(listing.values[0].name, "site");
        assert!(listing.next.is_some());
    }

    #[test]
    fn every_body_page_is_followed() {
        let server = MockServer::start(|base| {
            vec![
                (
                    "/repositories/team?pagelen=100".to_string(),
                    MockResponse::json(&format!(
                        r#"{{"values": [{{"name": "one",
                                         "links": {{"html": {{"href": "http://127.0.0.1:1/team/one"}}}}}}],
                            "next": "{}/repositories/team?pagelen=100&page=2"}}"#,
                        base
                    )),
                ),
                (
                    "/repositories/team?pagelen=100&page=2".to_string(),
                    MockResponse::json(
                        r#"{"values": [{"name": "two",
                                        "links": {"html": {"href": "http://127.0.0.1:1/team/two"}}}]}"#,
                    ),
                ),
            ]
        });

        let temp = tempfile::tempdir().unwrap();
        let bb = Bitbucket::with_api_root(source(), server.base());

        let stats = bb.run(temp.path()).unwrap();

        assert_eq!(server.hits(), 2);
        // Both repos were attempted; their clone URLs point at a dead port,
        // so both land in the failure list without aborting the pass.
        assert_eq!(stats.mirrored + stats.failures.len(), 2);
        assert!(temp.path().join("bitbucket").is_dir());
    }

    #[test]
    fn hostile_names_never_reach_the_filesystem() {
        let temp = tempfile::tempdir().unwrap();
        let bb = Bitbucket::new(source());

        let raw = RawRepo {
            name: String::from("../evil"),
            links: Links {
                html: Some(Href {
                    href: String::from("https://bitbucket.org/team/evil"),
                }),
            },
        };

        let err = bb.mirror_one(&raw, temp.path()).unwrap_err();

        assert!(err.downcast_ref::<names::InvalidName>().is_some());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn a_repo_without_a_browse_link_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let bb = Bitbucket::new(source());

        let raw = RawRepo {
            name: String::from("linkless"),
            links: Links::default(),
        };

        let err = bb.mirror_one(&raw, temp.path()).unwrap_err();

        assert!(err.downcast_ref::<MissingBrowseLink>().is_some());
    }

    #[test]
    fn a_failed_listing_aborts_the_source() {
        let server = MockServer::start(|_| {
            vec![(
                "/repositories/team?pagelen=100".to_string(),
                MockResponse::new(403, "no access"),
            )]
        });

        let temp = tempfile::tempdir().unwrap();
        let bb = Bitbucket::with_api_root(source(), server.base());

        let err = bb.run(temp.path()).unwrap_err();

        assert!(err
            .to_string()
            .contains("Unable to list the workspace's repositories"));
    }
}
