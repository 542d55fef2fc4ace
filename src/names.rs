//! Validation of remote-supplied names before they touch the filesystem.
//!
//! Repository and owner names come straight out of API responses, and both
//! get joined into local paths. Anything that doesn't look like a plain
//! repository name (path separators, leading dots, control characters, empty
//! strings) is rejected here rather than trusted.

use failure::{Error, Fail};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref VALID_NAME: Regex = Regex::new(r"^\w[-.\w]*$").unwrap();
}

/// Check that a remote-supplied name is safe to use as a path segment,
/// returning it unchanged if it is.
///
/// A name is valid iff it starts with a word character and continues with
/// word characters, hyphens or dots.
pub fn validate(name: &str) -> Result<&str, Error> {
    if VALID_NAME.is_match(name) {
        Ok(name)
    } else {
        Err(InvalidName {
            name: name.to_string(),
        }
        .into())
    }
}

/// A remote-supplied name which can't be trusted as a filesystem path
/// segment.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "Invalid name {:?}", name)]
pub struct InvalidName {
    pub name: String,
}
