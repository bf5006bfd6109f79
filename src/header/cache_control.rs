//! `Cache-Control` directives.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::header::reader::{self, HeaderTokens, ParseError};
use crate::header::{parse_with, HeaderParseError, CACHE_CONTROL};

/// Parsed `Cache-Control` value. A new value has `no-transform` set; a
/// parsed one only when the header says so.
///
/// ```
/// use jbrest::header::CacheControl;
///
/// let cc: CacheControl = "private=\"set-cookie\", max-age=60, public".parse().unwrap();
/// assert!(cc.is_private());
/// assert_eq!(cc.private_fields(), &["set-cookie".to_string()]);
/// assert_eq!(cc.max_age(), Some(60));
/// assert_eq!(cc.extensions().get("public"), Some(&None));
/// assert_eq!(cc.to_string(), "private=\"set-cookie\", max-age=60, public");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheControl {
    private: bool,
    private_fields: Vec<String>,
    no_cache: bool,
    no_cache_fields: Vec<String>,
    no_store: bool,
    no_transform: bool,
    must_revalidate: bool,
    proxy_revalidate: bool,
    max_age: Option<i64>,
    s_max_age: Option<i64>,
    extensions: BTreeMap<String, Option<String>>,
}

impl Default for CacheControl {
    fn default() -> Self {
        Self {
            private: false,
            private_fields: vec![],
            no_cache: false,
            no_cache_fields: vec![],
            no_store: false,
            no_transform: true,
            must_revalidate: false,
            proxy_revalidate: false,
            max_age: None,
            s_max_age: None,
            extensions: BTreeMap::new(),
        }
    }
}

impl CacheControl {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_private(mut self, fields: &[&str]) -> Self {
        self.private = true;
        self.private_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }
    pub fn with_no_cache(mut self, fields: &[&str]) -> Self {
        self.no_cache = true;
        self.no_cache_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }
    pub fn with_no_store(mut self, no_store: bool) -> Self {
        self.no_store = no_store;
        self
    }
    pub fn with_no_transform(mut self, no_transform: bool) -> Self {
        self.no_transform = no_transform;
        self
    }
    pub fn with_must_revalidate(mut self, must_revalidate: bool) -> Self {
        self.must_revalidate = must_revalidate;
        self
    }
    pub fn with_proxy_revalidate(mut self, proxy_revalidate: bool) -> Self {
        self.proxy_revalidate = proxy_revalidate;
        self
    }
    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }
    pub fn with_s_max_age(mut self, seconds: i64) -> Self {
        self.s_max_age = Some(seconds);
        self
    }
    pub fn with_extension(mut self, name: &str, value: Option<&str>) -> Self {
        self.extensions
            .insert(name.to_string(), value.map(str::to_string));
        self
    }
    pub fn is_private(&self) -> bool {
        self.private
    }
    pub fn private_fields(&self) -> &[String] {
        &self.private_fields
    }
    pub fn is_no_cache(&self) -> bool {
        self.no_cache
    }
    pub fn no_cache_fields(&self) -> &[String] {
        &self.no_cache_fields
    }
    pub fn is_no_store(&self) -> bool {
        self.no_store
    }
    pub fn is_no_transform(&self) -> bool {
        self.no_transform
    }
    pub fn is_must_revalidate(&self) -> bool {
        self.must_revalidate
    }
    pub fn is_proxy_revalidate(&self) -> bool {
        self.proxy_revalidate
    }
    pub fn max_age(&self) -> Option<i64> {
        self.max_age
    }
    pub fn s_max_age(&self) -> Option<i64> {
        self.s_max_age
    }
    pub fn extensions(&self) -> &BTreeMap<String, Option<String>> {
        &self.extensions
    }

    fn read_field_names(
        fields: &mut Vec<String>,
        reader: &mut dyn HeaderTokens,
    ) -> reader::Result<()> {
        if !reader.has_next_separator('=', false) {
            return Ok(());
        }
        reader.next_separator('=')?;
        let list = reader.next_quoted_string()?;
        fields.extend(
            list.split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string),
        );
        Ok(())
    }

    fn read_seconds(reader: &mut dyn HeaderTokens, directive: &str) -> reader::Result<i64> {
        reader.next_separator('=')?;
        let index = reader.index();
        reader.next_token()?.parse().map_err(|_| {
            ParseError::new(
                index,
                &format!("error parsing integer value for {} directive", directive),
            )
        })
    }

    fn read_directive(&mut self, reader: &mut dyn HeaderTokens) -> reader::Result<()> {
        let directive = reader.next_token()?.to_ascii_lowercase();
        match directive.as_str() {
            "private" => {
                self.private = true;
                Self::read_field_names(&mut self.private_fields, reader)?;
            }
            "no-cache" => {
                self.no_cache = true;
                Self::read_field_names(&mut self.no_cache_fields, reader)?;
            }
            "no-store" => self.no_store = true,
            "no-transform" => self.no_transform = true,
            "must-revalidate" => self.must_revalidate = true,
            "proxy-revalidate" => self.proxy_revalidate = true,
            "max-age" => self.max_age = Some(Self::read_seconds(reader, &directive)?),
            "s-maxage" => self.s_max_age = Some(Self::read_seconds(reader, &directive)?),
            _ => {
                let mut value = None;
                if reader.has_next_separator('=', false) {
                    reader.next_separator('=')?;
                    value = Some(reader.next_token_or_quoted_string(false)?);
                }
                self.extensions.insert(directive, value);
            }
        }
        Ok(())
    }

    pub(crate) fn read_from(reader: &mut dyn HeaderTokens) -> reader::Result<Self> {
        let mut cache_control = Self::new().with_no_transform(false);
        while reader.has_next() {
            cache_control.read_directive(reader)?;
            if reader.has_next_separator(',', true) {
                reader.next_separator(',')?;
            }
        }
        Ok(cache_control)
    }
}

struct Directives<'a, 'f> {
    f: &'a mut fmt::Formatter<'f>,
    first: bool,
}

impl<'a, 'f> Directives<'a, 'f> {
    fn name(&mut self, name: &str) -> fmt::Result {
        if !self.first {
            self.f.write_str(", ")?;
        }
        self.first = false;
        self.f.write_str(name)
    }
    fn fields(&mut self, name: &str, fields: &[String]) -> fmt::Result {
        self.name(name)?;
        if !fields.is_empty() {
            write!(self.f, "=\"{}\"", fields.join(", "))?;
        }
        Ok(())
    }
}

impl fmt::Display for CacheControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = Directives { f, first: true };
        if self.private {
            out.fields("private", &self.private_fields)?;
        }
        if self.no_cache {
            out.fields("no-cache", &self.no_cache_fields)?;
        }
        if self.no_store {
            out.name("no-store")?;
        }
        if self.no_transform {
            out.name("no-transform")?;
        }
        if self.must_revalidate {
            out.name("must-revalidate")?;
        }
        if self.proxy_revalidate {
            out.name("proxy-revalidate")?;
        }
        if let Some(max_age) = self.max_age {
            out.name("max-age")?;
            write!(out.f, "={}", max_age)?;
        }
        if let Some(s_max_age) = self.s_max_age {
            out.name("s-maxage")?;
            write!(out.f, "={}", s_max_age)?;
        }
        for (name, value) in &self.extensions {
            out.name(name)?;
            match value.as_deref() {
                Some("") | None => (),
                Some(value) if value.chars().any(char::is_whitespace) => {
                    write!(out.f, "=\"{}\"", value)?
                }
                Some(value) => write!(out.f, "={}", value)?,
            }
        }
        Ok(())
    }
}

impl FromStr for CacheControl {
    type Err = HeaderParseError;
    fn from_str(s: &str) -> Result<Self, HeaderParseError> {
        parse_with(CACHE_CONTROL, s, |r| Self::read_from(r))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_has_no_transform() {
        assert_eq!(CacheControl::new().to_string(), "no-transform");
        let parsed: CacheControl = "no-store".parse().unwrap();
        assert!(!parsed.is_no_transform());
        assert!(parsed.is_no_store());
    }

    #[test]
    fn test_parse_all_directives() {
        let cc: CacheControl =
            "no-cache=\"a, b\", no-store, no-transform, must-revalidate, proxy-revalidate, max-age=10, s-maxage=20, ext=\"x y\""
                .parse()
                .unwrap();
        assert!(cc.is_no_cache());
        assert_eq!(cc.no_cache_fields(), &["a".to_string(), "b".to_string()]);
        assert!(cc.is_must_revalidate() && cc.is_proxy_revalidate());
        assert_eq!(cc.s_max_age(), Some(20));
        assert_eq!(cc.extensions()["ext"], Some("x y".to_string()));
        assert_eq!(
            cc.to_string(),
            "no-cache=\"a, b\", no-store, no-transform, must-revalidate, proxy-revalidate, max-age=10, s-maxage=20, ext=\"x y\""
        );
        assert_eq!(cc.to_string().parse::<CacheControl>().unwrap(), cc);
    }

    #[test]
    fn test_bad_max_age() {
        let err = "max-age=ten".parse::<CacheControl>().unwrap_err();
        assert!(err
            .reason()
            .contains("error parsing integer value for max-age directive"));
    }
}
