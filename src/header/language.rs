//! Language tags (`Content-Language`, `Accept-Language`).
use std::fmt;
use std::hash;
use std::str::FromStr;

use crate::header::quality::{format_quality, Qualified, DEFAULT_QUALITY};
use crate::header::reader::{self, read_quality_factor_parameter, HeaderTokens, ParseError};
use crate::header::{parse_with, HeaderParseError};

/// `primary[-subtags]`, e.g. `en-US`. Compared case-insensitively.
#[derive(Debug, Clone)]
pub struct LanguageTag {
    primary: String,
    subtags: Option<String>,
}

impl LanguageTag {
    pub fn new(primary: &str, subtags: Option<&str>) -> Self {
        Self {
            primary: primary.to_string(),
            subtags: subtags.map(str::to_string),
        }
    }
    pub fn primary(&self) -> &str {
        &self.primary
    }
    pub fn subtags(&self) -> Option<&str> {
        self.subtags.as_deref()
    }
    pub fn is_wildcard(&self) -> bool {
        self.primary == "*"
    }
    /// `*` matches everything; a bare primary tag matches any tag sharing
    /// it; otherwise both parts must match.
    pub fn is_compatible(&self, other: &LanguageTag) -> bool {
        if self.is_wildcard() {
            return true;
        }
        if !self.primary.eq_ignore_ascii_case(&other.primary) {
            return false;
        }
        match (&self.subtags, &other.subtags) {
            (None, _) => true,
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (Some(_), None) => false,
        }
    }

    fn parse_tag(tag: &str, index: usize) -> reader::Result<Self> {
        if !is_valid(tag) {
            return Err(ParseError::new(
                index,
                &format!("invalid language tag '{}'", tag),
            ));
        }
        Ok(match tag.find('-') {
            Some(i) => Self::new(&tag[..i], Some(&tag[i + 1..])),
            None => Self::new(tag, None),
        })
    }

    pub(crate) fn read_from(reader: &mut dyn HeaderTokens) -> reader::Result<Self> {
        reader.has_next();
        let index = reader.index();
        let tag = reader.next_token()?;
        if reader.has_next() {
            return Err(ParseError::new(
                reader.index(),
                "invalid language tag, unexpected characters after tag",
            ));
        }
        Self::parse_tag(&tag, index)
    }
}

/// 1 to 8 letters, then any number of `-` separated 1 to 8 alphanumerics.
fn is_valid(tag: &str) -> bool {
    let mut count = 0;
    let mut dashes = 0;
    for c in tag.chars() {
        if c == '-' {
            if count == 0 {
                return false;
            }
            count = 0;
            dashes += 1;
        } else if c.is_ascii_alphabetic() || (c.is_ascii_digit() && dashes > 0) {
            count += 1;
            if count > 8 {
                return false;
            }
        } else {
            return false;
        }
    }
    count != 0
}

impl PartialEq for LanguageTag {
    fn eq(&self, other: &Self) -> bool {
        self.primary.eq_ignore_ascii_case(&other.primary)
            && match (&self.subtags, &other.subtags) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                (None, None) => true,
                _ => false,
            }
    }
}

impl Eq for LanguageTag {}

impl hash::Hash for LanguageTag {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.primary.to_ascii_lowercase().hash(state);
        self.subtags.as_ref().map(|s| s.to_ascii_lowercase()).hash(state);
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.primary)?;
        if let Some(subtags) = &self.subtags {
            write!(f, "-{}", subtags)?;
        }
        Ok(())
    }
}

impl FromStr for LanguageTag {
    type Err = HeaderParseError;
    fn from_str(s: &str) -> Result<Self, HeaderParseError> {
        parse_with(crate::header::CONTENT_LANGUAGE, s, |r| Self::read_from(r))
    }
}

/// Language tag from `Accept-Language` with its quality; `*` is allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AcceptableLanguageTag {
    tag: LanguageTag,
    quality: u16,
}

impl AcceptableLanguageTag {
    pub fn new(tag: LanguageTag, quality: u16) -> Self {
        Self {
            tag,
            quality: quality.min(DEFAULT_QUALITY),
        }
    }
    pub fn wildcard() -> Self {
        Self::new(LanguageTag::new("*", None), DEFAULT_QUALITY)
    }
    pub fn tag(&self) -> &LanguageTag {
        &self.tag
    }

    pub(crate) fn read_from(reader: &mut dyn HeaderTokens) -> reader::Result<Self> {
        reader.has_next();
        let index = reader.index();
        let token = reader.next_token()?;
        let tag = if token == "*" {
            LanguageTag::new("*", None)
        } else {
            LanguageTag::parse_tag(&token, index)?
        };
        let quality = if reader.has_next() {
            read_quality_factor_parameter(reader)?
        } else {
            DEFAULT_QUALITY
        };
        Ok(Self { tag, quality })
    }
}

impl Qualified for AcceptableLanguageTag {
    fn quality(&self) -> u16 {
        self.quality
    }
}

impl fmt::Display for AcceptableLanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)?;
        if self.quality != DEFAULT_QUALITY {
            write!(f, ";q={}", format_quality(self.quality))?;
        }
        Ok(())
    }
}

impl FromStr for AcceptableLanguageTag {
    type Err = HeaderParseError;
    fn from_str(s: &str) -> Result<Self, HeaderParseError> {
        parse_with(crate::header::ACCEPT_LANGUAGE, s, |r| Self::read_from(r))
    }
}
