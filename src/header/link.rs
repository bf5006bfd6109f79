//! Web links (`Link` header, RFC 5988).
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::header::reader::{self, HeaderTokens};
use crate::header::{parse_with, write_quoted, HeaderParseError, LINK};

pub const REL: &str = "rel";
pub const TITLE: &str = "title";
pub const TYPE: &str = "type";

/// `<uri>; name="value"; ...`
///
/// ```
/// use jbrest::header::Link;
///
/// let link: Link = "<http://example.com/next>; rel=\"next last\"".parse().unwrap();
/// assert_eq!(link.uri(), "http://example.com/next");
/// assert_eq!(link.rels(), vec!["next", "last"]);
/// assert!(link.has_rel("last"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    uri: String,
    params: BTreeMap<String, String>,
}

impl Link {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            params: BTreeMap::new(),
        }
    }
    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }
    pub fn with_rel(self, rel: &str) -> Self {
        self.with_param(REL, rel)
    }
    pub fn uri(&self) -> &str {
        &self.uri
    }
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
    pub fn rel(&self) -> Option<&str> {
        self.param(REL)
    }
    pub fn title(&self) -> Option<&str> {
        self.param(TITLE)
    }
    pub fn type_(&self) -> Option<&str> {
        self.param(TYPE)
    }
    /// Relation types; `rel` may hold several, separated by white space.
    pub fn rels(&self) -> Vec<&str> {
        self.rel()
            .map(|rel| rel.split_whitespace().collect())
            .unwrap_or_default()
    }
    pub fn has_rel(&self, relation: &str) -> bool {
        self.rels().contains(&relation)
    }

    pub(crate) fn read_from(reader: &mut dyn HeaderTokens) -> reader::Result<Self> {
        reader.has_next();
        let uri = reader.next_separated_string('<', '>')?;
        let mut link = Link::new(uri.trim());
        while reader.has_next() {
            reader.next_separator(';')?;
            reader.has_next();
            let name = reader.next_token()?;
            reader.has_next();
            reader.next_separator('=')?;
            reader.has_next();
            let value = reader.next_token_or_quoted_string(false)?;
            link.params.insert(name, value);
        }
        Ok(link)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.uri)?;
        for (name, value) in &self.params {
            write!(f, "; {}=", name)?;
            write_quoted(f, value)?;
        }
        Ok(())
    }
}

impl FromStr for Link {
    type Err = HeaderParseError;
    fn from_str(s: &str) -> Result<Self, HeaderParseError> {
        parse_with(LINK, s, |r| Self::read_from(r))
    }
}

/// Split a `Link` header value holding several links on the commas that
/// sit outside `<...>` and quoted strings.
pub fn split_links(header: &str) -> Vec<&str> {
    let mut links = vec![];
    let mut in_uri = false;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in header.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' if !in_uri => in_quotes = !in_quotes,
            '<' if !in_quotes => in_uri = true,
            '>' if !in_quotes => in_uri = false,
            ',' if !in_uri && !in_quotes => {
                links.push(header[start..i].trim());
                start = i + 1;
            }
            _ => (),
        }
    }
    links.push(header[start..].trim());
    links.retain(|l| !l.is_empty());
    links
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_link_round_trip() {
        let link = Link::new("http://example.com/a,b")
            .with_rel("self")
            .with_param("title", "A \"B\"");
        assert_eq!(
            link.to_string(),
            "<http://example.com/a,b>; rel=\"self\"; title=\"A \\\"B\\\"\""
        );
        assert_eq!(link.to_string().parse::<Link>().unwrap(), link);
    }

    #[test]
    fn test_link_errors() {
        assert!("http://example.com".parse::<Link>().is_err());
        assert!("<http://example.com".parse::<Link>().is_err());
        assert!("<http://example.com>; rel".parse::<Link>().is_err());
    }

    #[test]
    fn test_split_links() {
        let links = split_links(
            "<http://a/?x=1,2>; rel=\"next\", <http://b>; title=\"x, y\",, <http://c>",
        );
        assert_eq!(
            links,
            vec![
                "<http://a/?x=1,2>; rel=\"next\"",
                "<http://b>; title=\"x, y\"",
                "<http://c>"
            ]
        );
    }
}
