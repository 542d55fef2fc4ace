//! The on-disk side of a backup: bare mirror repositories updated via the
//! `git` binary.

use std::path::Path;
use std::process::Command;

use failure::{Error, Fail, ResultExt};
use log::{debug, trace};
use reqwest::Url;

use crate::utils;

/// Embed a username/token pair in a clone URL's authority component.
///
/// This is the only authentication mechanism the tool uses. Cloning over
/// HTTPS with the token in the URL means nothing needs to be written to a
/// credential file or the repository's own config; the secret lives in the
/// URL for the duration of one fetch and nowhere else. Scheme, host, port,
/// path, query and fragment are all preserved.
pub fn with_credentials(url: &str, username: &str, token: &str) -> Result<Url, Error> {
    let mut url: Url = url.parse::<Url>().context("Invalid clone URL")?;

    if url.set_username(username).is_err() || url.set_password(Some(token)).is_err() {
        return Err(CredentialsNotSupported {
            url: url.to_string(),
        }
        .into());
    }

    Ok(url)
}

/// The URL can't carry a username and password (e.g. it has no authority
/// component).
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "The URL {} can't carry credentials", url)]
pub struct CredentialsNotSupported {
    url: String,
}

/// Make sure `destination/repo_name` holds a bare mirror of the remote and
/// bring it up to date.
///
/// Safe to re-run: the directory is created only if missing, `git init` is
/// a no-op on an existing repository, and the fetch is forced and pruning,
/// so local branches and tags always end up matching the remote exactly.
pub fn mirror(repo_name: &str, url: &Url, destination: &Path) -> Result<(), Error> {
    let repo_path = destination.join(repo_name);
    utils::ensure_dir(&repo_path)?;

    debug!("Mirroring {} into {}", repo_name, repo_path.display());

    // git-init(1): "Running git init in an existing repository is safe."
    run_git(&repo_path, &["init", "--bare", "--quiet"], None)?;

    // Fetching straight into refs/heads/* (rather than cloning with a
    // configured remote) keeps the token off the disk entirely.
    run_git(
        &repo_path,
        &[
            "fetch",
            "--force",
            "--prune",
            "--tags",
            url.as_str(),
            "refs/heads/*:refs/heads/*",
        ],
        url.password(),
    )?;

    Ok(())
}

/// Run a git subcommand in `dir`, turning a non-zero exit into an error
/// built from its stderr. `secret` is scrubbed from the message first, since
/// git happily echoes the fetch URL back when it fails.
fn run_git(dir: &Path, args: &[&str], secret: Option<&str>) -> Result<(), Error> {
    trace!("Running git {} in {}", args[0], dir.display());

    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .context("Unable to invoke git")?;

    if output.status.success() {
        return Ok(());
    }

    let mut msg = String::from_utf8(output.stderr)
        .unwrap_or_else(|_| String::from("<couldn't read the error message>"));

    if let Some(secret) = secret {
        if !secret.is_empty() {
            msg = msg.replace(secret, "XXXXXXXXXX");
        }
    }

    Err(failure::err_msg(msg.trim().to_string())
        .context(format!("git {} failed", args[0]))
        .into())
}
