//! Remote URL parsing (spec §6).
//!
//! ```text
//! dropbox:///path/to/repo
//! dropbox://<username>@/path/to/repo
//! dropbox://:<inline-token>@/path/to/repo
//! ```
//!
//! The path is lower-cased; a trailing slash is an error; specifying both a
//! username and an inline token is an error.

use thiserror::Error;

const SCHEME: &str = "dropbox://";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("url `{0}` does not start with `{SCHEME}`")]
    MissingScheme(String),
    #[error("url path must not have a trailing slash: `{0}`")]
    TrailingSlash(String),
    #[error("url must not specify both a username and an inline token")]
    UsernameAndToken,
    #[error("url path must be absolute: `{0}`")]
    NotAbsolute(String),
}

/// A parsed `dropbox://` remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    /// Repository path inside the blob store, lower-cased, without a
    /// leading or trailing slash.
    pub path: String,
    /// Named account to use, from `dropbox://<username>@/path`.
    pub username: Option<String>,
    /// Token embedded directly in the URL, from `dropbox://:<token>@/path`.
    pub inline_token: Option<String>,
}

impl RemoteUrl {
    pub fn parse(s: &str) -> Result<Self, UrlError> {
        let rest = s
            .strip_prefix(SCHEME)
            .ok_or_else(|| UrlError::MissingScheme(s.to_string()))?;

        let (userinfo, path) = match rest.find('@') {
            Some(idx) => (Some(&rest[..idx]), &rest[idx + 1..]),
            None => (None, rest),
        };

        if !path.starts_with('/') {
            return Err(UrlError::NotAbsolute(s.to_string()));
        }
        if path.len() > 1 && path.ends_with('/') {
            return Err(UrlError::TrailingSlash(s.to_string()));
        }

        let (username, inline_token) = match userinfo {
            None | Some("") => (None, None),
            Some(info) => match info.split_once(':') {
                // `:<token>@` — inline token, no username.
                Some(("", token)) => (None, Some(token.to_string())),
                // `<user>:<token>@` — both given, which is an error below.
                Some((user, token)) => (Some(user.to_string()), Some(token.to_string())),
                None => (Some(info.to_string()), None),
            },
        };

        if username.is_some() && inline_token.is_some() {
            return Err(UrlError::UsernameAndToken);
        }

        let path = path.trim_start_matches('/').to_lowercase();

        Ok(Self {
            path,
            username,
            inline_token,
        })
    }
}

impl std::str::FromStr for RemoteUrl {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
