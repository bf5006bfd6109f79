//! Multi-valued, case-insensitive, insertion-ordered header map.
use std::fmt;
use std::iter::FromIterator;

use crate::header::HeaderName;

/// Header map shared by inbound (`V = String`) and outbound
/// (`V = HeaderValue`) messages.
///
/// A *guard* can be put on a header name: any change to that header marks
/// it observed until [`is_observed_and_reset`](Self::is_observed_and_reset)
/// is called. Message contexts use this to drop values they derived from
/// the header.
///
/// ```
/// use jbrest::header::HeaderMap;
///
/// let mut headers: HeaderMap<String> = HeaderMap::new();
/// headers.set_guard("Content-Type");
/// headers.add("content-type", "text/plain".to_string());
/// assert_eq!(headers.first("CONTENT-TYPE"), Some(&"text/plain".to_string()));
/// assert!(headers.is_observed_and_reset("Content-Type"));
/// assert!(!headers.is_observed_and_reset("Content-Type"));
/// ```
#[derive(Clone)]
pub struct HeaderMap<V> {
    entries: Vec<(HeaderName, Vec<V>)>,
    guards: Vec<(HeaderName, bool)>,
}

impl<V> Default for HeaderMap<V> {
    fn default() -> Self {
        Self {
            entries: vec![],
            guards: vec![],
        }
    }
}

impl<V> HeaderMap<V> {
    pub fn new() -> Self {
        Self::default()
    }
    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n.matches(name))
    }
    fn observe(&mut self, name: &str) {
        for (guard, observed) in self.guards.iter_mut() {
            if guard.matches(name) {
                *observed = true;
            }
        }
    }
    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn contains_key(&self, name: &str) -> bool {
        self.position(name).is_some()
    }
    pub fn get(&self, name: &str) -> Option<&[V]> {
        self.position(name).map(|i| &self.entries[i].1[..])
    }
    pub fn first(&self, name: &str) -> Option<&V> {
        self.get(name).and_then(|values| values.first())
    }
    pub fn add(&mut self, name: &str, value: V) {
        self.observe(name);
        match self.position(name) {
            Some(i) => self.entries[i].1.push(value),
            None => self.entries.push((HeaderName::new(name), vec![value])),
        }
    }
    pub fn add_all(&mut self, name: &str, values: Vec<V>) {
        for value in values {
            self.add(name, value);
        }
    }
    /// Replace all values of `name`; an empty list removes the header.
    pub fn put(&mut self, name: &str, values: Vec<V>) -> Option<Vec<V>> {
        if values.is_empty() {
            return self.remove(name);
        }
        self.observe(name);
        match self.position(name) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, values)),
            None => {
                self.entries.push((HeaderName::new(name), values));
                None
            }
        }
    }
    pub fn put_single(&mut self, name: &str, value: V) -> Option<Vec<V>> {
        self.put(name, vec![value])
    }
    pub fn remove(&mut self, name: &str) -> Option<Vec<V>> {
        let i = self.position(name)?;
        self.observe(name);
        Some(self.entries.remove(i).1)
    }
    pub fn clear(&mut self) {
        for (_, observed) in self.guards.iter_mut() {
            *observed = true;
        }
        self.entries.clear();
    }
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &[V])> {
        self.entries.iter().map(|(n, v)| (n, &v[..]))
    }
    pub fn names(&self) -> impl Iterator<Item = &HeaderName> {
        self.entries.iter().map(|(n, _)| n)
    }
    /// Convert every value, keeping names and order. Guards are not copied.
    pub fn map_values<U, F: Fn(&V) -> U>(&self, f: F) -> HeaderMap<U> {
        HeaderMap {
            entries: self
                .entries
                .iter()
                .map(|(n, v)| (n.clone(), v.iter().map(&f).collect()))
                .collect(),
            guards: vec![],
        }
    }

    /// Watch `name` for changes.
    pub fn set_guard(&mut self, name: &str) {
        if !self.guards.iter().any(|(g, _)| g.matches(name)) {
            self.guards.push((HeaderName::new(name), false));
        }
    }
    /// True if the guarded header `name` changed since the last call.
    pub fn is_observed_and_reset(&mut self, name: &str) -> bool {
        for (guard, observed) in self.guards.iter_mut() {
            if guard.matches(name) {
                return std::mem::replace(observed, false);
            }
        }
        false
    }
}

impl<V: fmt::Debug> fmt::Debug for HeaderMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(n, v)| (n.as_str(), v)))
            .finish()
    }
}

impl<V> FromIterator<(String, V)> for HeaderMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (name, value) in iter {
            map.add(&name, value);
        }
        map
    }
}
