//! Typed outbound header values.
use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::header::date::format_date;
use crate::header::{
    AcceptableLanguageTag, AcceptableMediaType, CacheControl, Cookie, EntityTag, LanguageTag,
    Link, MediaType, NewCookie,
};

/// A header value as set by application code, converted to its string
/// form only when the header is written or read back as text.
#[derive(Clone)]
pub enum HeaderValue {
    Text(String),
    MediaType(MediaType),
    AcceptableMediaType(AcceptableMediaType),
    Language(LanguageTag),
    AcceptableLanguage(AcceptableLanguageTag),
    Date(SystemTime),
    EntityTag(EntityTag),
    Link(Link),
    Cookie(Cookie),
    NewCookie(NewCookie),
    CacheControl(CacheControl),
    Number(i64),
    /// Anything else that can render itself.
    Other(Arc<dyn fmt::Display + Send + Sync>),
}

impl HeaderValue {
    pub fn text(s: &str) -> Self {
        HeaderValue::Text(s.to_string())
    }
    pub fn as_text(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_media_type(&self) -> Option<&MediaType> {
        match self {
            HeaderValue::MediaType(m) => Some(m),
            HeaderValue::AcceptableMediaType(m) => Some(m.media_type()),
            _ => None,
        }
    }
    pub fn as_acceptable_media_type(&self) -> Option<&AcceptableMediaType> {
        match self {
            HeaderValue::AcceptableMediaType(m) => Some(m),
            _ => None,
        }
    }
    pub fn as_language(&self) -> Option<&LanguageTag> {
        match self {
            HeaderValue::Language(l) => Some(l),
            HeaderValue::AcceptableLanguage(l) => Some(l.tag()),
            _ => None,
        }
    }
    pub fn as_acceptable_language(&self) -> Option<&AcceptableLanguageTag> {
        match self {
            HeaderValue::AcceptableLanguage(l) => Some(l),
            _ => None,
        }
    }
    pub fn as_date(&self) -> Option<SystemTime> {
        match self {
            HeaderValue::Date(d) => Some(*d),
            _ => None,
        }
    }
    pub fn as_entity_tag(&self) -> Option<&EntityTag> {
        match self {
            HeaderValue::EntityTag(e) => Some(e),
            _ => None,
        }
    }
    pub fn as_link(&self) -> Option<&Link> {
        match self {
            HeaderValue::Link(l) => Some(l),
            _ => None,
        }
    }
    pub fn as_cookie(&self) -> Option<&Cookie> {
        match self {
            HeaderValue::Cookie(c) => Some(c),
            _ => None,
        }
    }
    pub fn as_new_cookie(&self) -> Option<&NewCookie> {
        match self {
            HeaderValue::NewCookie(c) => Some(c),
            _ => None,
        }
    }
    pub fn as_number(&self) -> Option<i64> {
        match self {
            HeaderValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Text(s) => f.write_str(s),
            HeaderValue::MediaType(m) => write!(f, "{}", m),
            HeaderValue::AcceptableMediaType(m) => write!(f, "{}", m),
            HeaderValue::Language(l) => write!(f, "{}", l),
            HeaderValue::AcceptableLanguage(l) => write!(f, "{}", l),
            HeaderValue::Date(d) => f.write_str(&format_date(*d)),
            HeaderValue::EntityTag(e) => write!(f, "{}", e),
            HeaderValue::Link(l) => write!(f, "{}", l),
            HeaderValue::Cookie(c) => write!(f, "{}", c),
            HeaderValue::NewCookie(c) => write!(f, "{}", c),
            HeaderValue::CacheControl(c) => write!(f, "{}", c),
            HeaderValue::Number(n) => write!(f, "{}", n),
            HeaderValue::Other(o) => write!(f, "{}", o),
        }
    }
}

impl fmt::Debug for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string())
    }
}

macro_rules! header_value_from {
    ( $( $t:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl From<$t> for HeaderValue {
                fn from(value: $t) -> Self {
                    HeaderValue::$variant(value)
                }
            }
        )*
    };
}

header_value_from! {
    String => Text,
    MediaType => MediaType,
    AcceptableMediaType => AcceptableMediaType,
    LanguageTag => Language,
    AcceptableLanguageTag => AcceptableLanguage,
    SystemTime => Date,
    EntityTag => EntityTag,
    Link => Link,
    Cookie => Cookie,
    NewCookie => NewCookie,
    CacheControl => CacheControl,
    i64 => Number,
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::text(value)
    }
}

/// Lengths past `i64::MAX` saturate.
impl From<usize> for HeaderValue {
    fn from(value: usize) -> Self {
        HeaderValue::Number(i64::try_from(value).unwrap_or(i64::MAX))
    }
}
