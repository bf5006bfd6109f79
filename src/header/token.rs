//! `Accept-Charset` / `Accept-Encoding` elements.
use std::fmt;
use std::str::FromStr;

use crate::header::quality::{format_quality, Qualified, DEFAULT_QUALITY};
use crate::header::reader::{self, read_quality_factor_parameter, HeaderTokens};
use crate::header::{parse_with, HeaderParseError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AcceptableToken {
    token: String,
    quality: u16,
}

impl AcceptableToken {
    pub fn new(token: &str, quality: u16) -> Self {
        Self {
            token: token.to_string(),
            quality: quality.min(DEFAULT_QUALITY),
        }
    }
    pub fn wildcard() -> Self {
        Self::new("*", DEFAULT_QUALITY)
    }
    pub fn token(&self) -> &str {
        &self.token
    }
    pub fn is_wildcard(&self) -> bool {
        self.token == "*"
    }

    pub(crate) fn read_from(reader: &mut dyn HeaderTokens) -> reader::Result<Self> {
        reader.has_next();
        let token = reader.next_token()?;
        let quality = if reader.has_next() {
            read_quality_factor_parameter(reader)?
        } else {
            DEFAULT_QUALITY
        };
        Ok(Self { token, quality })
    }
}

impl Qualified for AcceptableToken {
    fn quality(&self) -> u16 {
        self.quality
    }
}

impl fmt::Display for AcceptableToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)?;
        if self.quality != DEFAULT_QUALITY {
            write!(f, ";q={}", format_quality(self.quality))?;
        }
        Ok(())
    }
}

impl FromStr for AcceptableToken {
    type Err = HeaderParseError;
    fn from_str(s: &str) -> Result<Self, HeaderParseError> {
        parse_with("token", s, |r| Self::read_from(r))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_acceptable_token() {
        let token: AcceptableToken = "gzip;q=0.5".parse().unwrap();
        assert_eq!(token.token(), "gzip");
        assert_eq!(token.quality(), 500);
        assert_eq!(token.to_string(), "gzip;q=0.5");
        assert!("*".parse::<AcceptableToken>().unwrap().is_wildcard());
        assert!("gzip;q=x".parse::<AcceptableToken>().is_err());
    }
}
