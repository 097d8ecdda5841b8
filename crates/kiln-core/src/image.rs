use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Tag assumed when a reference names neither a tag nor a digest.
pub const DEFAULT_TAG: &str = "latest";

/// A container image reference: `name[:tag][@digest]`.
///
/// The name may carry a registry host (with port) and path segments, so the
/// tag separator is only recognized after the last `/`.
///
/// # Examples
///
/// ```
/// use kiln_core::ImageRef;
///
/// let base: ImageRef = "music2:latest".parse().unwrap();
/// assert_eq!(base.name, "music2");
/// assert_eq!(base.tag.as_deref(), Some("latest"));
///
/// let local: ImageRef = "localhost:5000/audio/worker".parse().unwrap();
/// assert_eq!(local.name, "localhost:5000/audio/worker");
/// assert_eq!(local.tag_or_default(), "latest");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageRef {
    pub name: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageRef {
    pub fn parse(reference: &str) -> crate::Result<Self> {
        let invalid = |reason| crate::Error::InvalidImageRef {
            reference: reference.to_owned(),
            reason,
        };

        if reference.is_empty() {
            return Err(invalid("reference is empty"));
        }
        if reference.chars().any(char::is_whitespace) {
            return Err(invalid("reference contains whitespace"));
        }

        let (rest, digest) = match reference.split_once('@') {
            Some((_, "")) => return Err(invalid("digest is empty")),
            Some((rest, digest)) => (rest, Some(digest.to_owned())),
            None => (reference, None),
        };

        let last_slash = rest.rfind('/');
        let (name, tag) = match rest.rfind(':') {
            Some(colon) if last_slash.is_none_or(|slash| colon > slash) => {
                let tag = &rest[colon + 1..];
                if tag.is_empty() {
                    return Err(invalid("tag is empty"));
                }
                (&rest[..colon], Some(tag.to_owned()))
            }
            _ => (rest, None),
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.ends_with('/') || name.starts_with('/') {
            return Err(invalid("name has an empty path segment"));
        }
        if repository_path(name).chars().any(|c| c.is_ascii_uppercase()) {
            return Err(invalid("repository name must be lowercase"));
        }

        Ok(Self {
            name: name.to_owned(),
            tag,
            digest,
        })
    }

    /// Builds a `<name>:latest` reference for a local image, normalising the
    /// name to the lowercase character set Docker accepts for repositories.
    pub fn local(name: &str) -> crate::Result<Self> {
        let normalized: String = name
            .to_ascii_lowercase()
            .chars()
            .map(|c| match c {
                'a'..='z' | '0'..='9' | '.' | '_' | '-' => c,
                _ => '-',
            })
            .collect();
        let trimmed = normalized.trim_matches(|c| c == '-' || c == '.' || c == '_');
        let name = if trimmed.is_empty() { "kiln-image" } else { trimmed };
        Self::parse(&format!("{name}:{DEFAULT_TAG}"))
    }

    /// The explicit tag, or `latest` when none was given.
    pub fn tag_or_default(&self) -> &str {
        self.tag.as_deref().unwrap_or(DEFAULT_TAG)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

impl FromStr for ImageRef {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ImageRef {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<ImageRef> for String {
    fn from(value: ImageRef) -> Self {
        value.to_string()
    }
}

/// The part of `name` after an optional registry host. Docker treats the
/// first segment as a registry when it has a `.` or `:` or is `localhost`;
/// only the remainder is required to be lowercase.
fn repository_path(name: &str) -> &str {
    match name.split_once('/') {
        Some((host, rest)) if host.contains(['.', ':']) || host == "localhost" => rest,
        _ => name,
    }
}
