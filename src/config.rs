//! Loading and representing the settings document.
//!
//! The config is a JSON file naming the repository sources to mirror and an
//! optional repeat interval:
//!
//! ```json
//! {
//!   "repositories": [
//!     {
//!       "type": "github",
//!       "token": "<api token>",
//!       "directory": "github",
//!       "owners": ["michael"]
//!     },
//!     {
//!       "type": "bitbucket",
//!       "token": "<app password>",
//!       "directory": "bitbucket",
//!       "user": "michael",
//!       "workspace": "my-team"
//!     }
//!   ],
//!   "repeat": 30
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use failure::{Error, ResultExt};
use serde::{Deserialize, Deserializer};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

/// The full settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub repositories: Vec<SourceEntry>,
    /// Minutes to wait between passes. Zero (or anything non-numeric in the
    /// file) means run a single pass and exit.
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub repeat: u64,
}

impl Config {
    /// Read and parse a config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|_| format!("Couldn't read {}", path.display()))?;

        let cfg = serde_json::from_str(&raw)
            .with_context(|_| format!("Couldn't parse {}", path.display()))?;

        Ok(cfg)
    }

    /// A ready-to-edit example config.
    pub fn example() -> Config {
        Config {
            repositories: vec![
                SourceEntry::Known(Source::Github(GithubSource {
                    token: String::from("<your API token>"),
                    directory: String::from("github"),
                    owners: Some(
                        vec![String::from("your-login")]
                            .into_iter()
                            .collect(),
                    ),
                })),
                SourceEntry::Known(Source::Bitbucket(BitbucketSource {
                    token: String::from("<your app password>"),
                    directory: String::from("bitbucket"),
                    user: String::from("your-login"),
                    workspace: String::from("your-workspace"),
                })),
            ],
            repeat: 0,
        }
    }

    pub fn as_json(&self) -> Result<String, Error> {
        let pretty = serde_json::to_string_pretty(self).context("Couldn't serialize the config")?;
        Ok(pretty)
    }
}

/// One entry of the `repositories` array.
///
/// Entries with an unknown `type` (or otherwise malformed entries) are kept
/// as raw JSON instead of failing the whole file, so the driver can warn
/// about them by name rather than silently dropping a typo'd source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceEntry {
    Known(Source),
    Unknown(Value),
}

/// A recognised repository source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Source {
    Github(GithubSource),
    Bitbucket(BitbucketSource),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubSource {
    /// A personal access token with `repo` scope.
    pub token: String,
    /// Destination directory, relative to the backup root. `~` is expanded.
    pub directory: String,
    /// Only mirror repositories belonging to these owners. Absent or empty
    /// means mirror everything the token can see.
    #[serde(default)]
    pub owners: Option<HashSet<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitbucketSource {
    /// An app password for `user`.
    pub token: String,
    /// Destination directory, relative to the backup root. `~` is expanded.
    pub directory: String,
    pub user: String,
    pub workspace: String,
}

fn lenient_minutes<'de, D>(de: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(de)?;

    let minutes = match raw {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };

    Ok(minutes)
}
