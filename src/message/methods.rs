//! Typed header getters shared by inbound and outbound contexts.
use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use crate::header::cookie::read_cookies;
use crate::header::link::split_links;
use crate::header::list::read_string_list;
use crate::header::{
    self, read_date, Cookie, EntityTag, HeaderParseError, LanguageTag, Link, NewCookie,
};
use crate::message::{Direction, MessageError, Result};

/// Implementors provide raw header access; everything else is derived.
/// Single-valued headers holding more than one value are an error, as are
/// values that do not parse. Errors carry the message [`Direction`].
pub trait HeaderMethods {
    /// Values of `name` in string form, `None` when the header is absent.
    fn header_values(&self, name: &str) -> Option<Vec<String>>;
    fn direction(&self) -> Direction;

    /// All values of `name` joined with `,`.
    fn header_string(&self, name: &str) -> Option<String> {
        self.header_values(name).map(|values| values.join(","))
    }

    fn single_header(&self, name: &str) -> Result<Option<String>> {
        match self.header_values(name) {
            None => Ok(None),
            Some(mut values) => match values.len() {
                0 => Ok(None),
                1 => Ok(values.pop()),
                _ => Err(MessageError::TooManyHeaderValues {
                    name: name.to_string(),
                    values: values.join(", "),
                }),
            },
        }
    }

    /// Convert the single value of `name`.
    fn single_header_as<T, F>(&self, name: &str, convert: F) -> Result<Option<T>>
    where
        F: FnOnce(&str) -> std::result::Result<T, HeaderParseError>,
        Self: Sized,
    {
        match self.single_header(name)? {
            None => Ok(None),
            Some(value) => convert(&value)
                .map(Some)
                .map_err(|e| MessageError::header_value(name, &value, self.direction(), e)),
        }
    }

    /// Methods listed in `Allow`, upper-cased.
    fn allowed_methods(&self) -> Result<HashSet<String>> {
        let allowed = match self.header_string(header::ALLOW) {
            Some(allowed) if !allowed.is_empty() => allowed,
            _ => return Ok(HashSet::new()),
        };
        read_string_list(&allowed.to_ascii_uppercase())
            .map(|methods| methods.into_iter().collect())
            .map_err(|e| {
                MessageError::header_value(
                    header::ALLOW,
                    &allowed,
                    self.direction(),
                    HeaderParseError::from_parse(header::ALLOW, &allowed, &e),
                )
            })
    }

    fn date(&self) -> Result<Option<SystemTime>> {
        match self.single_header(header::DATE)? {
            None => Ok(None),
            Some(value) => read_date(&value)
                .map(Some)
                .map_err(|e| MessageError::header_value(header::DATE, &value, self.direction(), e)),
        }
    }

    fn last_modified(&self) -> Result<Option<SystemTime>> {
        match self.single_header(header::LAST_MODIFIED)? {
            None => Ok(None),
            Some(value) => read_date(&value).map(Some).map_err(|e| {
                MessageError::header_value(header::LAST_MODIFIED, &value, self.direction(), e)
            }),
        }
    }

    fn entity_tag(&self) -> Result<Option<EntityTag>> {
        match self.single_header(header::ETAG)? {
            None => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|e| MessageError::header_value(header::ETAG, &value, self.direction(), e)),
        }
    }

    fn language(&self) -> Result<Option<LanguageTag>> {
        match self.single_header(header::CONTENT_LANGUAGE)? {
            None => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|e| {
                MessageError::header_value(header::CONTENT_LANGUAGE, &value, self.direction(), e)
            }),
        }
    }

    /// `Content-Length`; empty or negative values read as unknown.
    fn length(&self) -> Result<Option<u64>> {
        match self.single_header(header::CONTENT_LENGTH)? {
            None => Ok(None),
            Some(value) if value.trim().is_empty() => Ok(None),
            Some(value) => match value.trim().parse::<i64>() {
                Ok(length) if length >= 0 => Ok(Some(length as u64)),
                Ok(_) => Ok(None),
                Err(e) => Err(MessageError::header_value(
                    header::CONTENT_LENGTH,
                    &value,
                    self.direction(),
                    HeaderParseError::new(header::CONTENT_LENGTH, &e.to_string()),
                )),
            },
        }
    }

    fn location(&self) -> Result<Option<String>> {
        self.single_header(header::LOCATION)
    }

    /// Every link of every `Link` header, without duplicates.
    fn links(&self) -> Result<Vec<Link>> {
        let mut links: Vec<Link> = vec![];
        for value in self.header_values(header::LINK).unwrap_or_default() {
            for part in split_links(&value) {
                let link: Link = part.parse().map_err(|e| {
                    MessageError::header_value(header::LINK, part, self.direction(), e)
                })?;
                if !links.contains(&link) {
                    links.push(link);
                }
            }
        }
        Ok(links)
    }

    /// First link whose `rel` lists `relation`.
    fn link(&self, relation: &str) -> Result<Option<Link>> {
        Ok(self
            .links()?
            .into_iter()
            .find(|link| link.has_rel(relation)))
    }

    fn has_link(&self, relation: &str) -> Result<bool> {
        Ok(self.link(relation)?.is_some())
    }

    /// Cookies of all `Cookie` headers; the first cookie of a name wins.
    fn request_cookies(&self) -> HashMap<String, Cookie> {
        let mut cookies = HashMap::new();
        for value in self.header_values(header::COOKIE).unwrap_or_default() {
            for cookie in read_cookies(&value) {
                cookies
                    .entry(cookie.name().to_string())
                    .or_insert(cookie);
            }
        }
        cookies
    }

    /// Cookies of all `Set-Cookie` headers; repeated names resolve to the
    /// preferred cookie.
    fn response_cookies(&self) -> Result<HashMap<String, NewCookie>> {
        let mut cookies: HashMap<String, NewCookie> = HashMap::new();
        for value in self.header_values(header::SET_COOKIE).unwrap_or_default() {
            let cookie: NewCookie = value.parse().map_err(|e| {
                MessageError::header_value(header::SET_COOKIE, &value, self.direction(), e)
            })?;
            let name = cookie.name().to_string();
            let cookie = match cookies.remove(&name) {
                Some(existing) => existing.preferred(cookie),
                None => cookie,
            };
            cookies.insert(name, cookie);
        }
        Ok(cookies)
    }

    /// True if any `,` separated, trimmed value of `name` satisfies
    /// `predicate`.
    fn contains_header_string<P>(&self, name: &str, predicate: P) -> bool
    where
        P: Fn(&str) -> bool,
        Self: Sized,
    {
        self.contains_header_string_split(name, ',', predicate)
    }

    fn contains_header_string_split<P>(&self, name: &str, separator: char, predicate: P) -> bool
    where
        P: Fn(&str) -> bool,
        Self: Sized,
    {
        match self.header_string(name) {
            Some(header) => header.split(separator).any(|s| predicate(s.trim())),
            None => false,
        }
    }
}
