//! Request (`Cookie`) and response (`Set-Cookie`) cookies.
//!
//! ```
//! use jbrest::header::cookie::read_cookies;
//!
//! let cookies = read_cookies("$Version=1; session=abc; $Path=/app, theme=dark");
//! assert_eq!(cookies[0].name(), "session");
//! assert_eq!(cookies[0].path(), Some("/app"));
//! assert_eq!(cookies[1].value(), "dark");
//! ```
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use crate::header::date::{format_date, read_date};
use crate::header::{write_quoted_if_white_space, HeaderParseError, COOKIE, SET_COOKIE};

pub const DEFAULT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cookie {
    name: String,
    value: String,
    version: u32,
    path: Option<String>,
    domain: Option<String>,
}

impl Cookie {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            version: DEFAULT_VERSION,
            path: None,
            domain: None,
        }
    }
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }
    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn value(&self) -> &str {
        &self.value
    }
    pub fn version(&self) -> u32 {
        self.version
    }
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$Version={};{}=", self.version, self.name)?;
        write_quoted_if_white_space(f, &self.value)?;
        if let Some(path) = &self.path {
            f.write_str(";$Path=")?;
            write_quoted_if_white_space(f, path)?;
        }
        if let Some(domain) = &self.domain {
            f.write_str(";$Domain=")?;
            write_quoted_if_white_space(f, domain)?;
        }
        Ok(())
    }
}

impl FromStr for Cookie {
    type Err = HeaderParseError;
    fn from_str(s: &str) -> Result<Self, HeaderParseError> {
        read_cookies(s)
            .into_iter()
            .next()
            .ok_or_else(|| HeaderParseError::new(COOKIE, &format!("no cookie in '{}'", s)))
    }
}

/// Split `name=value`, trimming both sides. A quoted value loses its quotes
/// and its quoted pairs are unescaped.
fn crumbs(bite: &str) -> (&str, Cow<'_, str>) {
    let mut parts = bite.splitn(2, '=');
    let name = parts.next().unwrap_or("").trim();
    let value = parts.next().unwrap_or("").trim();
    if value.len() > 1 && value.starts_with('"') && value.ends_with('"') {
        return (name, Cow::Owned(unquote(&value[1..value.len() - 1])));
    }
    (name, Cow::Borrowed(value))
}

fn unquote(quoted: &str) -> String {
    let mut value = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => value.extend(chars.next()),
            c => value.push(c),
        }
    }
    value
}

/// Read every cookie in a `Cookie` header, in order. `$Version` applies to
/// the cookies after it; `$Path` and `$Domain` to the cookie before them.
/// When a name repeats the first occurrence is kept, as user agents list the
/// most specific path first.
pub fn read_cookies(header: &str) -> Vec<Cookie> {
    let mut cookies: Vec<Cookie> = vec![];
    let mut current: Option<Cookie> = None;
    let mut version = 0;
    for bite in header.split(|c| c == ';' || c == ',') {
        let (name, value) = crumbs(bite);
        if name.is_empty() {
            continue;
        }
        if !name.starts_with('$') {
            push_cookie(&mut cookies, current.take());
            current = Some(Cookie::new(name, &value).with_version(version));
        } else if name.eq_ignore_ascii_case("$Version") {
            version = value.parse().unwrap_or(version);
        } else if name.eq_ignore_ascii_case("$Path") {
            if let Some(cookie) = current.as_mut() {
                cookie.path = Some(value.to_string());
            }
        } else if name.eq_ignore_ascii_case("$Domain") {
            if let Some(cookie) = current.as_mut() {
                cookie.domain = Some(value.to_string());
            }
        }
    }
    push_cookie(&mut cookies, current);
    cookies
}

fn push_cookie(cookies: &mut Vec<Cookie>, cookie: Option<Cookie>) {
    if let Some(cookie) = cookie {
        if !cookies.iter().any(|c| c.name == cookie.name) {
            cookies.push(cookie);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => f.write_str("Strict"),
            SameSite::Lax => f.write_str("Lax"),
            SameSite::None => f.write_str("None"),
        }
    }
}

impl FromStr for SameSite {
    type Err = HeaderParseError;
    fn from_str(s: &str) -> Result<Self, HeaderParseError> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            _ => Err(HeaderParseError::new(
                SET_COOKIE,
                &format!("invalid SameSite value '{}'", s),
            )),
        }
    }
}

/// A cookie set by a `Set-Cookie` response header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NewCookie {
    cookie: Cookie,
    comment: Option<String>,
    max_age: Option<i64>,
    expiry: Option<SystemTime>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl NewCookie {
    pub fn new(cookie: Cookie) -> Self {
        Self {
            cookie,
            comment: None,
            max_age: None,
            expiry: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
    pub fn with_max_age(mut self, max_age: i64) -> Self {
        self.max_age = Some(max_age);
        self
    }
    pub fn with_expiry(mut self, expiry: SystemTime) -> Self {
        self.expiry = Some(expiry);
        self
    }
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
    pub fn cookie(&self) -> &Cookie {
        &self.cookie
    }
    pub fn name(&self) -> &str {
        self.cookie.name()
    }
    pub fn value(&self) -> &str {
        self.cookie.value()
    }
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }
    pub fn max_age(&self) -> Option<i64> {
        self.max_age
    }
    pub fn expiry(&self) -> Option<SystemTime> {
        self.expiry
    }
    pub fn is_secure(&self) -> bool {
        self.secure
    }
    pub fn is_http_only(&self) -> bool {
        self.http_only
    }
    pub fn same_site(&self) -> Option<SameSite> {
        self.same_site
    }

    /// Of two cookies with the same name, the one with the longer path,
    /// then the later expiry, then the larger max age. `other` wins ties.
    pub fn preferred(self, other: NewCookie) -> NewCookie {
        let path_len = |c: &NewCookie| c.cookie.path.as_ref().map(String::len);
        let ordering = path_len(&self)
            .cmp(&path_len(&other))
            .then_with(|| self.expiry.cmp(&other.expiry))
            .then_with(|| self.max_age.cmp(&other.max_age));
        match ordering {
            Ordering::Greater => self,
            _ => other,
        }
    }
}

impl fmt::Display for NewCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=", self.cookie.name)?;
        write_quoted_if_white_space(f, &self.cookie.value)?;
        write!(f, ";Version={}", self.cookie.version)?;
        if let Some(comment) = &self.comment {
            f.write_str(";Comment=")?;
            write_quoted_if_white_space(f, comment)?;
        }
        if let Some(domain) = &self.cookie.domain {
            f.write_str(";Domain=")?;
            write_quoted_if_white_space(f, domain)?;
        }
        if let Some(path) = &self.cookie.path {
            f.write_str(";Path=")?;
            write_quoted_if_white_space(f, path)?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, ";Max-Age={}", max_age)?;
        }
        if self.secure {
            f.write_str(";Secure")?;
        }
        if self.http_only {
            f.write_str(";HttpOnly")?;
        }
        if let Some(expiry) = self.expiry {
            write!(f, ";Expires={}", format_date(expiry))?;
        }
        if let Some(same_site) = self.same_site {
            write!(f, ";SameSite={}", same_site)?;
        }
        Ok(())
    }
}

/// Attributes are `;` separated; `Expires` dates contain commas, so unlike
/// the `Cookie` header a comma does not end the cookie.
impl FromStr for NewCookie {
    type Err = HeaderParseError;
    fn from_str(s: &str) -> Result<Self, HeaderParseError> {
        let invalid = |what: &str, value: &str| {
            HeaderParseError::new(SET_COOKIE, &format!("invalid {} '{}' in '{}'", what, value, s))
        };
        let mut bites = s.split(';');
        let (name, value) = crumbs(bites.next().unwrap_or(""));
        if name.is_empty() {
            return Err(HeaderParseError::new(
                SET_COOKIE,
                &format!("no cookie in '{}'", s),
            ));
        }
        let mut cookie = NewCookie::new(Cookie::new(name, &value));
        for bite in bites {
            let (name, value) = crumbs(bite);
            match name.to_ascii_lowercase().as_str() {
                "comment" => cookie.comment = Some(value.to_string()),
                "domain" => cookie.cookie.domain = Some(value.to_string()),
                "path" => cookie.cookie.path = Some(value.to_string()),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                "version" => {
                    cookie.cookie.version = value.parse().map_err(|_| invalid("version", &value))?
                }
                "max-age" => {
                    cookie.max_age = Some(value.parse().map_err(|_| invalid("max age", &value))?)
                }
                "expires" => {
                    cookie.expiry = Some(read_date(&value).map_err(|_| invalid("expiry", &value))?)
                }
                "samesite" => cookie.same_site = Some(value.parse()?),
                _ => (),
            }
        }
        Ok(cookie)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_cookie_round_trip() {
        let cookie = Cookie::new("fred", "flintstone").with_path("/bedrock");
        assert_eq!(cookie.to_string(), "$Version=1;fred=flintstone;$Path=/bedrock");
        assert_eq!(cookie.to_string().parse::<Cookie>().unwrap(), cookie);
    }

    #[test]
    fn test_cookie_versions_and_quotes() {
        let cookies = read_cookies("a=\"1\"; $Version=2; b=2; $Domain=example.com");
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].value(), "1");
        assert_eq!(cookies[0].version(), 0);
        assert_eq!(cookies[1].version(), 2);
        assert_eq!(cookies[1].domain(), Some("example.com"));
        assert!("".parse::<Cookie>().is_err());
    }

    #[test]
    fn test_quoted_pairs_unescaped() {
        let cookies = read_cookies(r#"a="say \"hi\" \\o/"; b="plain""#);
        assert_eq!(cookies[0].value(), r#"say "hi" \o/"#);
        assert_eq!(cookies[1].value(), "plain");

        let cookie = Cookie::new("a", "say \"hi\"");
        assert_eq!(cookie.to_string(), r#"$Version=1;a="say \"hi\"""#);
        assert_eq!(cookie.to_string().parse::<Cookie>().unwrap(), cookie);
        let set: NewCookie = r#"sid="x \"y\""; Path=/"#.parse().unwrap();
        assert_eq!(set.value(), "x \"y\"");
    }

    #[test]
    fn test_repeated_cookie_keeps_first() {
        let cookies = read_cookies("id=1; $Path=/a/b; id=2; $Path=/a");
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].value(), "1");
    }

    #[test]
    fn test_new_cookie_parse() {
        let cookie: NewCookie =
            "sid=31d4; Path=/; Domain=example.com; Max-Age=3600; Secure; HttpOnly; SameSite=lax; Expires=Sun, 06 Nov 1994 08:49:37 GMT"
                .parse()
                .unwrap();
        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.cookie().path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(3600));
        assert!(cookie.is_secure() && cookie.is_http_only());
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(
            cookie.expiry(),
            Some(UNIX_EPOCH + Duration::from_secs(784111777))
        );
        assert_eq!(cookie.to_string().parse::<NewCookie>().unwrap(), cookie);
    }

    #[test]
    fn test_new_cookie_errors() {
        assert!("sid=1; Max-Age=soon".parse::<NewCookie>().is_err());
        assert!("sid=1; SameSite=sometimes".parse::<NewCookie>().is_err());
        assert!("=1".parse::<NewCookie>().is_err());
    }

    #[test]
    fn test_preferred_cookie() {
        let short = NewCookie::new(Cookie::new("a", "1").with_path("/"));
        let long = NewCookie::new(Cookie::new("a", "2").with_path("/app"));
        assert_eq!(short.clone().preferred(long.clone()).value(), "2");
        assert_eq!(long.preferred(short).value(), "2");

        let old = NewCookie::new(Cookie::new("a", "1")).with_max_age(10);
        let young = NewCookie::new(Cookie::new("a", "2")).with_max_age(100);
        assert_eq!(young.preferred(old).value(), "2");

        let first = NewCookie::new(Cookie::new("a", "1"));
        let second = NewCookie::new(Cookie::new("a", "2"));
        assert_eq!(first.preferred(second).value(), "2");
    }
}
