//! Media types and their `Accept` / `qs` weighted forms.
use std::fmt;
use std::hash;
use std::str::FromStr;

use crate::header::quality::{format_quality, Qualified, DEFAULT_QUALITY};
use crate::header::reader::{
    self, read_parameters, read_quality_factor, HeaderTokens, Parameters,
};
use crate::header::{parse_with, write_quoted_if_non_token, HeaderParseError};

pub const WILDCARD: &str = "*";
pub const CHARSET_PARAMETER: &str = "charset";
pub const QUALITY_PARAMETER: &str = "q";
pub const QUALITY_SOURCE_PARAMETER: &str = "qs";

/// A `type/subtype;name=value` media type. Type and subtype compare
/// case-insensitively, parameter names are stored lower-cased.
#[derive(Debug, Clone)]
pub struct MediaType {
    type_: String,
    subtype: String,
    parameters: Parameters,
}

macro_rules! media_types {
    ( $( $name:ident => $t:literal, $s:literal; )* ) => {
        impl MediaType {
            $(
                pub fn $name() -> Self {
                    Self::new($t, $s)
                }
            )*
        }
    };
}

media_types! {
    wildcard => "*", "*";
    application_atom_xml => "application", "atom+xml";
    application_form_urlencoded => "application", "x-www-form-urlencoded";
    application_json => "application", "json";
    application_octet_stream => "application", "octet-stream";
    application_svg_xml => "application", "svg+xml";
    application_xhtml_xml => "application", "xhtml+xml";
    application_xml => "application", "xml";
    multipart_form_data => "multipart", "form-data";
    text_html => "text", "html";
    text_plain => "text", "plain";
    text_xml => "text", "xml";
}

impl MediaType {
    pub fn new(type_: &str, subtype: &str) -> Self {
        Self {
            type_: type_.to_string(),
            subtype: subtype.to_string(),
            parameters: Parameters::new(),
        }
    }
    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }
    pub fn with_parameters<I>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in parameters {
            self.parameters.insert(name.to_ascii_lowercase(), value);
        }
        self
    }
    pub fn with_charset(self, charset: &str) -> Self {
        self.with_parameter(CHARSET_PARAMETER, charset)
    }
    /// Same type and subtype, no parameters.
    pub fn without_parameters(&self) -> Self {
        Self::new(&self.type_, &self.subtype)
    }
    pub fn type_(&self) -> &str {
        &self.type_
    }
    pub fn subtype(&self) -> &str {
        &self.subtype
    }
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
    pub fn charset(&self) -> Option<&str> {
        self.parameter(CHARSET_PARAMETER)
    }
    pub fn is_wildcard_type(&self) -> bool {
        self.type_ == WILDCARD
    }
    pub fn is_wildcard_subtype(&self) -> bool {
        self.subtype == WILDCARD
    }
    /// True for `application/json` and any `+json` structured syntax suffix.
    pub fn is_json(&self) -> bool {
        self.subtype.eq_ignore_ascii_case("json")
            || self.subtype.to_ascii_lowercase().ends_with("+json")
    }
    /// True if either type could stand for the other, wildcards included.
    ///
    /// ```
    /// use jbrest::header::MediaType;
    ///
    /// let html = MediaType::text_html();
    /// assert!(html.is_compatible(&MediaType::new("text", "*")));
    /// assert!(MediaType::wildcard().is_compatible(&html));
    /// assert!(!html.is_compatible(&MediaType::text_plain()));
    /// ```
    pub fn is_compatible(&self, other: &MediaType) -> bool {
        if self.is_wildcard_type() || other.is_wildcard_type() {
            return true;
        }
        self.type_.eq_ignore_ascii_case(&other.type_)
            && (self.is_wildcard_subtype()
                || other.is_wildcard_subtype()
                || self.subtype.eq_ignore_ascii_case(&other.subtype))
    }
    /// Type and subtype equal, parameters ignored.
    pub fn type_equal(&self, other: &MediaType) -> bool {
        self.type_.eq_ignore_ascii_case(&other.type_)
            && self.subtype.eq_ignore_ascii_case(&other.subtype)
    }
    /// Specificity: 0 for `type/subtype`, 1 for `type/*`, 2 for `*/*`.
    pub fn rank(&self) -> u8 {
        if self.is_wildcard_type() {
            2
        } else if self.is_wildcard_subtype() {
            1
        } else {
            0
        }
    }
    /// The more specific of two media types, `self` on ties.
    pub fn most_specific<'a>(&'a self, other: &'a MediaType) -> &'a MediaType {
        if other.rank() < self.rank() {
            other
        } else {
            self
        }
    }

    pub(crate) fn read_from(reader: &mut dyn HeaderTokens) -> reader::Result<Self> {
        reader.has_next();
        let type_ = reader.next_token()?;
        reader.next_separator('/')?;
        let subtype = reader.next_token()?;
        let parameters = if reader.has_next() {
            read_parameters(reader, false)?
        } else {
            Parameters::new()
        };
        Ok(Self {
            type_,
            subtype,
            parameters,
        })
    }

    /// `type[/subtype]` where a bare type means `type/*`, as some clients
    /// send `*` for `*/*` in `Accept`.
    fn read_acceptable(reader: &mut dyn HeaderTokens) -> reader::Result<Self> {
        reader.has_next();
        let type_ = reader.next_token()?;
        let subtype = if reader.has_next_separator('/', false) {
            reader.next_event(false, false)?;
            reader.next_token()?
        } else {
            WILDCARD.to_string()
        };
        let parameters = if reader.has_next() {
            read_parameters(reader, false)?
        } else {
            Parameters::new()
        };
        Ok(Self {
            type_,
            subtype,
            parameters,
        })
    }

    fn take_quality(&mut self, name: &str) -> reader::Result<u16> {
        match self.parameters.shift_remove(name) {
            Some(value) => read_quality_factor(&value),
            None => Ok(DEFAULT_QUALITY),
        }
    }
}

impl Default for MediaType {
    fn default() -> Self {
        Self::wildcard()
    }
}

impl PartialEq for MediaType {
    fn eq(&self, other: &Self) -> bool {
        self.type_equal(other) && self.parameters == other.parameters
    }
}

impl Eq for MediaType {}

impl hash::Hash for MediaType {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.type_.to_ascii_lowercase().hash(state);
        self.subtype.to_ascii_lowercase().hash(state);
        let mut parameters: Vec<_> = self.parameters.iter().collect();
        parameters.sort();
        parameters.hash(state);
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)?;
        for (name, value) in &self.parameters {
            write!(f, ";{}=", name)?;
            write_quoted_if_non_token(f, value)?;
        }
        Ok(())
    }
}

impl FromStr for MediaType {
    type Err = HeaderParseError;
    fn from_str(s: &str) -> Result<Self, HeaderParseError> {
        parse_with("media type", s, |r| Self::read_from(r))
    }
}

/// Media type from an `Accept` header together with its `q` weight.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AcceptableMediaType {
    media_type: MediaType,
    quality: u16,
}

impl AcceptableMediaType {
    pub fn new(media_type: MediaType, quality: u16) -> Self {
        Self {
            media_type,
            quality: quality.min(DEFAULT_QUALITY),
        }
    }
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }
    pub fn into_media_type(self) -> MediaType {
        self.media_type
    }

    pub(crate) fn read_from(reader: &mut dyn HeaderTokens) -> reader::Result<Self> {
        let mut media_type = MediaType::read_acceptable(reader)?;
        let quality = media_type.take_quality(QUALITY_PARAMETER)?;
        Ok(Self {
            media_type,
            quality,
        })
    }
}

impl Qualified for AcceptableMediaType {
    fn quality(&self) -> u16 {
        self.quality
    }
}

impl From<MediaType> for AcceptableMediaType {
    fn from(media_type: MediaType) -> Self {
        Self::new(media_type, DEFAULT_QUALITY)
    }
}

impl fmt::Display for AcceptableMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.media_type)?;
        if self.quality != DEFAULT_QUALITY {
            write!(f, ";{}={}", QUALITY_PARAMETER, format_quality(self.quality))?;
        }
        Ok(())
    }
}

impl FromStr for AcceptableMediaType {
    type Err = HeaderParseError;
    fn from_str(s: &str) -> Result<Self, HeaderParseError> {
        parse_with(crate::header::ACCEPT, s, |r| Self::read_from(r))
    }
}

/// Media type a server can produce, weighted by its `qs` quality source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualitySourceMediaType {
    media_type: MediaType,
    quality_source: u16,
}

impl QualitySourceMediaType {
    pub fn new(media_type: MediaType, quality_source: u16) -> Self {
        Self {
            media_type,
            quality_source: quality_source.min(DEFAULT_QUALITY),
        }
    }
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    pub(crate) fn read_from(reader: &mut dyn HeaderTokens) -> reader::Result<Self> {
        let mut media_type = MediaType::read_from(reader)?;
        let quality_source = media_type.take_quality(QUALITY_SOURCE_PARAMETER)?;
        Ok(Self {
            media_type,
            quality_source,
        })
    }
}

impl Qualified for QualitySourceMediaType {
    fn quality(&self) -> u16 {
        self.quality_source
    }
}

impl From<MediaType> for QualitySourceMediaType {
    fn from(media_type: MediaType) -> Self {
        Self::new(media_type, DEFAULT_QUALITY)
    }
}

impl fmt::Display for QualitySourceMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.media_type)?;
        if self.quality_source != DEFAULT_QUALITY {
            write!(
                f,
                ";{}={}",
                QUALITY_SOURCE_PARAMETER,
                format_quality(self.quality_source)
            )?;
        }
        Ok(())
    }
}

impl FromStr for QualitySourceMediaType {
    type Err = HeaderParseError;
    fn from_str(s: &str) -> Result<Self, HeaderParseError> {
        parse_with("media type", s, |r| Self::read_from(r))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_media_type() {
        let mt: MediaType = "application/xml; charset=\"UTF-8\"; Level=1".parse().unwrap();
        assert_eq!(mt.type_(), "application");
        assert_eq!(mt.subtype(), "xml");
        assert_eq!(mt.charset(), Some("UTF-8"));
        assert_eq!(mt.parameter("LEVEL"), Some("1"));
        assert_eq!(mt.to_string(), "application/xml;charset=UTF-8;level=1");
    }

    #[test]
    fn test_parameters_keep_wire_order() {
        let mt: MediaType = "text/html;level=2;charset=utf-8".parse().unwrap();
        assert_eq!(mt.to_string(), "text/html;level=2;charset=utf-8");
        let other = MediaType::text_html()
            .with_charset("utf-8")
            .with_parameter("level", "2");
        assert_eq!(mt, other);
        let mut set = std::collections::HashSet::new();
        set.insert(mt);
        assert!(set.contains(&other));
    }

    #[test]
    fn test_parse_media_type_errors() {
        assert!("text".parse::<MediaType>().is_err());
        assert!("text/".parse::<MediaType>().is_err());
        assert!("text/html;charset".parse::<MediaType>().is_err());
        assert!("/html".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_quoted_parameter_round_trip() {
        let mt = MediaType::new("multipart", "mixed").with_parameter("boundary", "a b\"c");
        assert_eq!(mt.to_string(), "multipart/mixed;boundary=\"a b\\\"c\"");
        assert_eq!(mt.to_string().parse::<MediaType>().unwrap(), mt);
    }

    #[test]
    fn test_equality_ignores_type_case() {
        let a: MediaType = "TEXT/Plain".parse().unwrap();
        assert_eq!(a, MediaType::text_plain());
        assert_ne!(a, MediaType::text_plain().with_charset("utf-8"));
    }

    #[test]
    fn test_rank_and_json() {
        assert_eq!(MediaType::text_html().rank(), 0);
        assert_eq!(MediaType::new("text", "*").rank(), 1);
        assert_eq!(MediaType::wildcard().rank(), 2);
        assert!(MediaType::application_json().is_json());
        assert!(MediaType::new("application", "hal+json").is_json());
        assert!(!MediaType::application_xml().is_json());
    }

    #[test]
    fn test_acceptable_media_type() {
        let amt: AcceptableMediaType = "text/html;level=1;q=0.7".parse().unwrap();
        assert_eq!(amt.quality(), 700);
        assert_eq!(amt.media_type().parameter("q"), None);
        assert_eq!(amt.to_string(), "text/html;level=1;q=0.7");

        let star: AcceptableMediaType = "*".parse().unwrap();
        assert_eq!(star.media_type(), &MediaType::new("*", "*"));
        assert!("text/html;q=2".parse::<AcceptableMediaType>().is_err());
    }

    #[test]
    fn test_quality_source_media_type() {
        let qs: QualitySourceMediaType = "application/xml;qs=0.5".parse().unwrap();
        assert_eq!(qs.quality(), 500);
        assert_eq!(qs.media_type(), &MediaType::application_xml());
        assert_eq!(qs.to_string(), "application/xml;qs=0.5");
    }
}
