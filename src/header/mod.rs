//! HTTP header names, value types and the grammar they are parsed with.
//!
//! Every header value type implements [`FromStr`](std::str::FromStr) and
//! [`Display`](std::fmt::Display):
//!
//! ```
//! use jbrest::header::{AcceptableMediaType, MediaType, Qualified};
//!
//! let media_type: MediaType = "Text/HTML; Charset=utf-8".parse().unwrap();
//! assert_eq!(media_type, MediaType::text_html().with_charset("utf-8"));
//! assert_eq!(media_type.to_string(), "Text/HTML;charset=utf-8");
//!
//! let accepted: AcceptableMediaType = "text/*;q=0.5".parse().unwrap();
//! assert_eq!(accepted.quality(), 500);
//! ```
use std::fmt;
use std::hash;

use thiserror::Error;

pub use cache_control::CacheControl;
pub use cookie::{Cookie, NewCookie, SameSite};
pub use date::{format_date, read_date};
pub use entity_tag::{EntityTag, EntityTagMatch};
pub use language::{AcceptableLanguageTag, LanguageTag};
pub use link::Link;
pub use map::HeaderMap;
pub use media_type::{AcceptableMediaType, MediaType, QualitySourceMediaType};
pub use quality::{Qualified, DEFAULT_QUALITY, MINIMUM_QUALITY};
pub use token::AcceptableToken;
pub use value::HeaderValue;

pub mod cache_control;
pub mod cookie;
pub mod date;
pub mod entity_tag;
pub mod grammar;
pub mod language;
pub mod link;
pub mod list;
mod lru;
pub mod map;
pub mod media_type;
pub mod quality;
pub mod reader;
pub mod token;
pub mod value;

use reader::{HeaderReader, ParseError};

pub const ACCEPT: &str = "Accept";
pub const ACCEPT_CHARSET: &str = "Accept-Charset";
pub const ACCEPT_ENCODING: &str = "Accept-Encoding";
pub const ACCEPT_LANGUAGE: &str = "Accept-Language";
pub const ALLOW: &str = "Allow";
pub const CACHE_CONTROL: &str = "Cache-Control";
pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const CONTENT_LANGUAGE: &str = "Content-Language";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_LOCATION: &str = "Content-Location";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const COOKIE: &str = "Cookie";
pub const DATE: &str = "Date";
pub const ETAG: &str = "ETag";
pub const EXPIRES: &str = "Expires";
pub const HOST: &str = "Host";
pub const IF_MATCH: &str = "If-Match";
pub const IF_MODIFIED_SINCE: &str = "If-Modified-Since";
pub const IF_NONE_MATCH: &str = "If-None-Match";
pub const IF_UNMODIFIED_SINCE: &str = "If-Unmodified-Since";
pub const LAST_MODIFIED: &str = "Last-Modified";
pub const LINK: &str = "Link";
pub const LOCATION: &str = "Location";
pub const RETRY_AFTER: &str = "Retry-After";
pub const SET_COOKIE: &str = "Set-Cookie";
pub const USER_AGENT: &str = "User-Agent";
pub const VARY: &str = "Vary";
pub const WWW_AUTHENTICATE: &str = "WWW-Authenticate";

/// Header field name; compares and hashes case-insensitively but keeps the
/// spelling it was created with.
#[derive(Debug, Clone)]
pub struct HeaderName(String);

impl HeaderName {
    pub fn new(s: &str) -> Self {
        Self(s.to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn matches(&self, name: &str) -> bool {
        self.0.eq_ignore_ascii_case(name)
    }
}

impl PartialEq for HeaderName {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for HeaderName {}

impl hash::Hash for HeaderName {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HeaderName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for HeaderName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<HeaderName> for String {
    fn from(s: HeaderName) -> Self {
        s.0
    }
}

/// Failure converting a header string into a typed value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("error parsing header '{header}': {reason}")]
pub struct HeaderParseError {
    header: String,
    reason: String,
}

impl HeaderParseError {
    pub fn new(header: &str, reason: &str) -> Self {
        Self {
            header: header.to_string(),
            reason: reason.to_string(),
        }
    }
    pub fn header(&self) -> &str {
        &self.header
    }
    pub fn reason(&self) -> &str {
        &self.reason
    }
    pub(crate) fn from_parse(header: &str, value: &str, err: &ParseError) -> Self {
        Self::new(header, &format!("{} in '{}'", err, value))
    }
}

/// Run `f` over a fresh reader for `value`, mapping grammar errors to a
/// [`HeaderParseError`] for `header`.
pub(crate) fn parse_with<T, F>(header: &str, value: &str, f: F) -> Result<T, HeaderParseError>
where
    F: FnOnce(&mut HeaderReader<'_>) -> reader::Result<T>,
{
    let mut reader = HeaderReader::new(value);
    f(&mut reader).map_err(|e| HeaderParseError::from_parse(header, value, &e))
}

/// Write `value`, quoted and escaped unless it is a non-empty token.
pub(crate) fn write_quoted_if_non_token(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    if grammar::is_token_string(value) {
        f.write_str(value)
    } else {
        write_quoted(f, value)
    }
}

/// Write `value`, quoted and escaped if it is empty or contains white space.
pub(crate) fn write_quoted_if_white_space(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    if value.is_empty() || grammar::contains_white_space(value) {
        write_quoted(f, value)
    } else {
        f.write_str(value)
    }
}

pub(crate) fn write_quoted(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in value.chars() {
        if c == '"' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{}", c)?;
    }
    f.write_str("\"")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::reader::HeaderTokens;
    use std::collections::HashMap;

    #[test]
    fn test_header_name_case_insensitive() {
        let mut map = HashMap::new();
        map.insert(HeaderName::new("Content-Type"), 1);
        assert_eq!(map.get(&HeaderName::new("content-type")), Some(&1));
        assert_eq!(HeaderName::new("ETAG"), HeaderName::from(ETAG));
        assert_eq!(HeaderName::new("ETag").to_string(), "ETag");
    }

    #[test]
    fn test_parse_error_carries_position() {
        let err = parse_with("Test", "a b", |r| {
            let token = r.next_token()?;
            r.next_token()?;
            Ok(token)
        })
        .unwrap_err();
        assert_eq!(err.header(), "Test");
        assert_eq!(
            err.reason(),
            "error parsing header at position 1: white space is not allowed in 'a b'"
        );
    }
}
