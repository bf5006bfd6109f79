//! Entity tags (`ETag`, `If-Match`, `If-None-Match`).
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::header::reader::{self, Event, HeaderTokens, ParseError};
use crate::header::{parse_with, write_quoted, HeaderParseError};

/// An opaque entity tag, `"value"` or weak `W/"value"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityTag {
    value: String,
    weak: bool,
}

impl EntityTag {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            weak: false,
        }
    }
    pub fn weak(value: &str) -> Self {
        Self {
            value: value.to_string(),
            weak: true,
        }
    }
    pub fn value(&self) -> &str {
        &self.value
    }
    pub fn is_weak(&self) -> bool {
        self.weak
    }
    /// Strong comparison: both tags strong and the values equal.
    pub fn strong_eq(&self, other: &EntityTag) -> bool {
        !self.weak && !other.weak && self.value == other.value
    }
    /// Weak comparison: values equal regardless of weakness.
    pub fn weak_eq(&self, other: &EntityTag) -> bool {
        self.value == other.value
    }

    pub(crate) fn read_from(reader: &mut dyn HeaderTokens) -> reader::Result<Self> {
        match reader.next_event(false, false)? {
            Event::QuotedString => return Ok(Self::new(reader.event_value())),
            Event::Token if reader.event_value().starts_with('W') => {
                reader.next_separator('/')?;
                return Ok(Self::weak(&reader.next_quoted_string()?));
            }
            _ => (),
        }
        Err(ParseError::new(reader.index(), "error parsing entity tag"))
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weak {
            f.write_str("W/")?;
        }
        write_quoted(f, &self.value)
    }
}

impl FromStr for EntityTag {
    type Err = HeaderParseError;
    fn from_str(s: &str) -> Result<Self, HeaderParseError> {
        parse_with(crate::header::ETAG, s, |r| Self::read_from(r))
    }
}

/// Value of `If-Match` / `If-None-Match`: `*` or a set of tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityTagMatch {
    Any,
    Tags(HashSet<EntityTag>),
}

impl EntityTagMatch {
    pub fn is_any(&self) -> bool {
        matches!(self, EntityTagMatch::Any)
    }
    /// True if `tag` is matched, using weak comparison when `weak` is set.
    pub fn matches(&self, tag: &EntityTag, weak: bool) -> bool {
        match self {
            EntityTagMatch::Any => true,
            EntityTagMatch::Tags(tags) => tags.iter().any(|t| {
                if weak {
                    t.weak_eq(tag)
                } else {
                    t.strong_eq(tag)
                }
            }),
        }
    }
}

impl FromStr for EntityTagMatch {
    type Err = HeaderParseError;
    fn from_str(s: &str) -> Result<Self, HeaderParseError> {
        crate::header::list::read_matching_entity_tags(s)
            .map_err(|e| HeaderParseError::from_parse(crate::header::IF_MATCH, s, &e))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_entity_tags() {
        let strong: EntityTag = "\"xyzzy\"".parse().unwrap();
        assert_eq!(strong, EntityTag::new("xyzzy"));
        let weak: EntityTag = "W/\"xyzzy\"".parse().unwrap();
        assert!(weak.is_weak());
        assert_eq!(weak.to_string(), "W/\"xyzzy\"");
        assert!(weak.weak_eq(&strong));
        assert!(!weak.strong_eq(&strong));
    }

    #[test]
    fn test_invalid_entity_tags() {
        assert!("xyzzy".parse::<EntityTag>().is_err());
        assert!("W\"xyzzy\"".parse::<EntityTag>().is_err());
        assert!("W/xyzzy".parse::<EntityTag>().is_err());
    }

    #[test]
    fn test_escaped_value_round_trip() {
        let tag = EntityTag::new("a\"b");
        assert_eq!(tag.to_string(), "\"a\\\"b\"");
        assert_eq!(tag.to_string().parse::<EntityTag>().unwrap(), tag);
    }

    #[test]
    fn test_entity_tag_match() {
        assert!("*".parse::<EntityTagMatch>().unwrap().is_any());
        let m: EntityTagMatch = "\"a\", W/\"b\"".parse().unwrap();
        assert!(m.matches(&EntityTag::new("a"), false));
        assert!(!m.matches(&EntityTag::new("b"), false));
        assert!(m.matches(&EntityTag::new("b"), true));
        assert!(!m.matches(&EntityTag::new("c"), true));
    }
}
