use std::fs;
use std::marker::PhantomData;
use std::path::Path;

use failure::{Error, Fail, ResultExt};
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, LINK};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Upper bound on the number of listing pages followed for a single
/// endpoint. A server which hands out "next" links forever is misbehaving,
/// so the paginator gives up instead of spinning.
pub(crate) const MAX_PAGES: usize = 1000;

pub(crate) fn http_client() -> Result<Client, Error> {
    let client = Client::builder()
        .user_agent(concat!("repo-mirror/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Unable to construct the HTTP client")?;

    Ok(client)
}

/// Issue a single authenticated GET and deserialize the JSON body.
pub(crate) fn get_json<T>(client: &Client, url: &str, token: &str) -> Result<T, Error>
where
    T: DeserializeOwned,
{
    let (body, _next) = fetch_page(client, url, token)?;
    let got = serde_json::from_value(body).context("Unable to deserialize the response")?;

    Ok(got)
}

fn fetch_page(client: &Client, url: &str, token: &str) -> Result<(Value, Option<String>), Error> {
    debug!("Sending request to {}", url);

    let response = client
        .get(url)
        .header(ACCEPT, "application/vnd.github.v3+json")
        .header(AUTHORIZATION, format!("token {}", token))
        .send()
        .context("Unable to send the request")?;

    let status = response.status();
    debug!("Received response ({})", status);

    let next = next_link(response.headers());

    if !status.is_success() {
        warn!("Request failed with {}", status);

        let err = FailedRequest {
            status,
            url: url.to_string(),
        };

        return Err(err.into());
    }

    let body: Value = response
        .json()
        .context("The response body wasn't valid JSON")?;

    Ok((body, next))
}

/// The server responded with a non-2xx status code.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "Request to {} failed with {}", url, status)]
pub struct FailedRequest {
    pub status: StatusCode,
    pub url: String,
}

/// Pull the `rel="next"` target out of a `Link` header, if there is one.
pub(crate) fn next_link(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(LINK)?.to_str().ok()?;

    for part in raw.split(',') {
        let mut pieces = part.trim().split(';');
        let target = pieces.next().unwrap_or("").trim();

        if !(target.starts_with('<') && target.ends_with('>')) {
            continue;
        }

        let is_next = pieces.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });

        if is_next {
            return Some(target[1..target.len() - 1].to_string());
        }
    }

    None
}

/// A lazy walk over a paginated listing endpoint.
///
/// Each call to `next()` fetches exactly one page, decodes it as a `P`, and
/// remembers the `rel="next"` link for the following call. The walk ends
/// when a response carries no "next" relation. Iterating again means
/// building a new `Paginated`, which re-issues the request to the first
/// page.
pub(crate) struct Paginated<P> {
    client: Client,
    token: String,
    next_endpoint: Option<String>,
    pages_fetched: usize,
    _phantom: PhantomData<P>,
}

impl<P> Paginated<P>
where
    P: DeserializeOwned,
{
    pub fn new(client: &Client, token: &str, endpoint: &str) -> Paginated<P> {
        Paginated {
            client: client.clone(),
            token: token.to_string(),
            next_endpoint: Some(endpoint.to_string()),
            pages_fetched: 0,
            _phantom: PhantomData,
        }
    }
}

impl<P> Iterator for Paginated<P>
where
    P: DeserializeOwned,
{
    type Item = Result<P, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let endpoint = self.next_endpoint.take()?;

        if self.pages_fetched >= MAX_PAGES {
            warn!("Giving up after {} pages of {}", self.pages_fetched, endpoint);
            return Some(Err(RunawayPagination {
                pages: self.pages_fetched,
            }
            .into()));
        }

        match fetch_page(&self.client, &endpoint, &self.token) {
            Ok((body, next)) => {
                self.pages_fetched += 1;
                self.next_endpoint = next;

                let page = serde_json::from_value(body)
                    .context("Unable to deserialize the response")
                    .map_err(Error::from);
                Some(page)
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// The server never stopped handing out "next" links.
#[derive(Debug, Copy, Clone, PartialEq, Fail)]
#[fail(display = "The listing didn't end after {} pages", pages)]
pub struct RunawayPagination {
    pub pages: usize,
}

/// Create a directory (and any missing ancestors), returning whether
/// anything needed creating. Mirror directories are group-accessible so a
/// backup user and its admins can share them.
pub(crate) fn ensure_dir(path: &Path) -> Result<bool, Error> {
    if path.is_dir() {
        return Ok(false);
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o770);
    }

    builder
        .create(path)
        .with_context(|_| format!("Couldn't create {}", path.display()))?;

    Ok(true)
}
