//! Comma separated list headers, parsed once per distinct header string.
//!
//! Each list kind has a process-wide reader holding an LRU of parsed lists.
//! Lookup and parsing happen under the same lock, so concurrent requests
//! carrying a popular `Accept` value never parse it twice.
//!
//! ```
//! use jbrest::header::list::read_accept_media_type;
//! use jbrest::header::Qualified;
//!
//! let accept = read_accept_media_type("text/*;q=0.5, text/html, */*;q=0.1").unwrap();
//! let order: Vec<String> = accept.iter().map(|m| m.to_string()).collect();
//! assert_eq!(order, vec!["text/html", "text/*;q=0.5", "*/*;q=0.1"]);
//! ```
use std::collections::HashSet;

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::header::entity_tag::{EntityTag, EntityTagMatch};
use crate::header::language::AcceptableLanguageTag;
use crate::header::lru::{Lru, DEFAULT_CAPACITY};
use crate::header::media_type::{AcceptableMediaType, MediaType, QualitySourceMediaType};
use crate::header::quality::{sort_qualified, Qualified};
use crate::header::reader::{self, HeaderReader, HeaderTokens, ListAdapter};
use crate::header::token::AcceptableToken;

type Creator<T> = fn(&mut dyn HeaderTokens) -> reader::Result<T>;

/// Parse every element of `header` with `creator`.
fn read_list<T>(header: &str, creator: Creator<T>) -> reader::Result<Vec<T>> {
    let mut reader = HeaderReader::new(header);
    let mut list = vec![];
    while reader.has_next() {
        let mut adapter = ListAdapter::new(&mut reader);
        list.push(creator(&mut adapter)?);
        if reader.has_next() {
            reader.next()?;
        }
    }
    Ok(list)
}

struct ListReader<T> {
    cache: Mutex<Lru<Vec<T>>>,
    creator: Creator<T>,
    sort: fn(&mut [T]),
}

impl<T: Clone> ListReader<T> {
    fn new(creator: Creator<T>, sort: fn(&mut [T])) -> Self {
        Self {
            cache: Mutex::new(Lru::new(DEFAULT_CAPACITY)),
            creator,
            sort,
        }
    }
    fn read(&self, header: &str) -> reader::Result<Vec<T>> {
        let mut cache = self.cache.lock();
        if let Some(list) = cache.get(header) {
            return Ok(list.clone());
        }
        let mut list = read_list(header, self.creator)?;
        (self.sort)(&mut list);
        cache.put(header.to_string(), list.clone());
        Ok(list)
    }
    #[cfg(test)]
    fn is_cached(&self, header: &str) -> bool {
        self.cache.lock().contains(header)
    }
}

fn unsorted<T>(_: &mut [T]) {}

/// Quality, then exact types before `type/*` before `*/*`.
pub fn sort_acceptable_media_types(list: &mut [AcceptableMediaType]) {
    sort_qualified(list, |a, b| a.media_type().rank().cmp(&b.media_type().rank()));
}

fn sort_quality_source_media_types(list: &mut [QualitySourceMediaType]) {
    sort_qualified(list, |a, b| a.media_type().rank().cmp(&b.media_type().rank()));
}

/// Quality, then specific values before `*`.
pub fn sort_acceptable_tokens(list: &mut [AcceptableToken]) {
    sort_qualified(list, |a, b| a.is_wildcard().cmp(&b.is_wildcard()));
}

/// Quality, then specific tags before `*`.
pub fn sort_acceptable_languages(list: &mut [AcceptableLanguageTag]) {
    sort_qualified(list, |a, b| a.tag().is_wildcard().cmp(&b.tag().is_wildcard()));
}

fn read_string(reader: &mut dyn HeaderTokens) -> reader::Result<String> {
    reader.has_next();
    reader.next_token()
}

lazy_static! {
    static ref MEDIA_TYPES: ListReader<MediaType> =
        ListReader::new(MediaType::read_from, unsorted);
    static ref ACCEPTABLE_MEDIA_TYPES: ListReader<AcceptableMediaType> =
        ListReader::new(AcceptableMediaType::read_from, sort_acceptable_media_types);
    static ref QUALITY_SOURCE_MEDIA_TYPES: ListReader<QualitySourceMediaType> =
        ListReader::new(QualitySourceMediaType::read_from, sort_quality_source_media_types);
    static ref ACCEPTABLE_TOKENS: ListReader<AcceptableToken> =
        ListReader::new(AcceptableToken::read_from, sort_acceptable_tokens);
    static ref ACCEPTABLE_LANGUAGES: ListReader<AcceptableLanguageTag> =
        ListReader::new(AcceptableLanguageTag::read_from, sort_acceptable_languages);
    static ref STRINGS: ListReader<String> = ListReader::new(read_string, unsorted);
}

pub fn read_media_types(header: &str) -> reader::Result<Vec<MediaType>> {
    MEDIA_TYPES.read(header)
}

pub fn read_accept_media_type(header: &str) -> reader::Result<Vec<AcceptableMediaType>> {
    ACCEPTABLE_MEDIA_TYPES.read(header)
}

pub fn read_quality_source_media_type(
    header: &str,
) -> reader::Result<Vec<QualitySourceMediaType>> {
    QUALITY_SOURCE_MEDIA_TYPES.read(header)
}

/// Join several header values into one list before reading.
pub fn read_quality_source_media_types(
    headers: &[&str],
) -> reader::Result<Vec<QualitySourceMediaType>> {
    read_quality_source_media_type(&headers.join(","))
}

/// Order `header` by client quality multiplied by the `qs` of the first
/// priority type with the same type and subtype, then by client quality,
/// then by specificity. Types with no priority counterpart weigh zero.
///
/// ```
/// use jbrest::header::list::{read_accept_media_type_with_priority, read_quality_source_media_type};
///
/// let produces = read_quality_source_media_type("application/xml;qs=0.5, application/json").unwrap();
/// let accept = read_accept_media_type_with_priority("application/xml, application/json;q=0.8", &produces).unwrap();
/// assert_eq!(accept[0].media_type().subtype(), "json");
/// ```
pub fn read_accept_media_type_with_priority(
    header: &str,
    priority: &[QualitySourceMediaType],
) -> reader::Result<Vec<AcceptableMediaType>> {
    let mut list = read_list(header, AcceptableMediaType::read_from)?;
    let effective = |m: &AcceptableMediaType| -> u32 {
        priority
            .iter()
            .find(|p| m.media_type().type_equal(p.media_type()))
            .map_or(0, |p| u32::from(m.quality()) * u32::from(p.quality()))
    };
    list.sort_by(|a, b| {
        effective(b)
            .cmp(&effective(a))
            .then_with(|| b.quality().cmp(&a.quality()))
            .then_with(|| a.media_type().rank().cmp(&b.media_type().rank()))
    });
    Ok(list)
}

pub fn read_accept_token(header: &str) -> reader::Result<Vec<AcceptableToken>> {
    ACCEPTABLE_TOKENS.read(header)
}

pub fn read_accept_language(header: &str) -> reader::Result<Vec<AcceptableLanguageTag>> {
    ACCEPTABLE_LANGUAGES.read(header)
}

/// Comma separated tokens, e.g. `Allow` or `Vary`.
pub fn read_string_list(header: &str) -> reader::Result<Vec<String>> {
    STRINGS.read(header)
}

/// `If-Match` / `If-None-Match`; not cached.
pub fn read_matching_entity_tags(header: &str) -> reader::Result<EntityTagMatch> {
    if header.trim() == "*" {
        return Ok(EntityTagMatch::Any);
    }
    let tags: HashSet<EntityTag> = read_list(header, EntityTag::read_from)?
        .into_iter()
        .collect();
    Ok(EntityTagMatch::Tags(tags))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn names<T: ToString>(list: &[T]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_accept_ordering() {
        let list = read_accept_media_type(
            "text/*;q=0.3, text/html;q=0.7, text/html;level=1, text/html;level=2;q=0.4, */*;q=0.5",
        )
        .unwrap();
        assert_eq!(
            names(&list),
            vec![
                "text/html;level=1",
                "text/html;q=0.7",
                "*/*;q=0.5",
                "text/html;level=2;q=0.4",
                "text/*;q=0.3",
            ]
        );
    }

    #[test]
    fn test_equal_quality_by_specificity() {
        let list = read_accept_media_type("*/*, text/*, text/plain").unwrap();
        assert_eq!(names(&list), vec!["text/plain", "text/*", "*/*"]);
        let mut resorted = list.clone();
        sort_acceptable_media_types(&mut resorted);
        assert_eq!(resorted, list);
    }

    #[test]
    fn test_parse_failure() {
        let err = read_accept_media_type("text/html;q=1.5").unwrap_err();
        assert_eq!(err.reason(), "the quality value, 1.5, is greater than 1");
        assert!(read_accept_media_type("text/html,,text/plain").is_err());
    }

    #[test]
    fn test_languages_and_tokens() {
        let languages = read_accept_language("*;q=0.5, da, en-gb;q=0.8, en;q=0.5").unwrap();
        assert_eq!(names(&languages), vec!["da", "en-gb;q=0.8", "en;q=0.5", "*;q=0.5"]);
        let tokens = read_accept_token("*, gzip;q=0.5, identity").unwrap();
        assert_eq!(names(&tokens), vec!["identity", "*", "gzip;q=0.5"]);
    }

    #[test]
    fn test_string_list() {
        assert_eq!(
            read_string_list("GET, POST,PUT").unwrap(),
            vec!["GET".to_string(), "POST".to_string(), "PUT".to_string()]
        );
        assert!(read_string_list("").unwrap().is_empty());
    }

    #[test]
    fn test_media_types_keep_order() {
        let list = read_media_types("text/plain, application/json;charset=utf-8").unwrap();
        assert_eq!(list[0], MediaType::text_plain());
        assert_eq!(list[1].charset(), Some("utf-8"));
    }

    #[test]
    fn test_priority_ordering() {
        let priority =
            read_quality_source_media_types(&["application/xml;qs=0.5", "text/plain"]).unwrap();
        let list = read_accept_media_type_with_priority(
            "application/xml, text/plain;q=0.6, image/png",
            &priority,
        )
        .unwrap();
        assert_eq!(
            names(&list),
            vec!["text/plain;q=0.6", "application/xml", "image/png"]
        );
    }

    #[test]
    fn test_cache_is_populated() {
        let header = "application/vnd.cache-test+json;q=0.9, */*;q=0.1";
        assert!(!ACCEPTABLE_MEDIA_TYPES.is_cached(header));
        let first = read_accept_media_type(header).unwrap();
        assert!(ACCEPTABLE_MEDIA_TYPES.is_cached(header));
        assert_eq!(read_accept_media_type(header).unwrap(), first);
    }

    #[test]
    fn test_concurrent_readers_agree() {
        let header = Arc::new("text/html;q=0.5, application/json, text/*;q=0.1".to_string());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let header = Arc::clone(&header);
                thread::spawn(move || read_accept_media_type(&header).unwrap())
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for result in &results[1..] {
            assert_eq!(result, &results[0]);
        }
        assert_eq!(results[0][0].media_type(), &MediaType::application_json());
    }

    #[test]
    fn test_matching_entity_tags() {
        assert!(read_matching_entity_tags(" * ").unwrap().is_any());
        match read_matching_entity_tags("\"a\", \"b\"").unwrap() {
            EntityTagMatch::Tags(tags) => assert_eq!(tags.len(), 2),
            EntityTagMatch::Any => panic!("expected tags"),
        }
        assert!(read_matching_entity_tags("a").is_err());
    }
}
