//! Pull tokenizer over a single header value.
//!
//! [`HeaderReader`] walks a header string one lexical unit at a time, the
//! way the request parser walks a request: a cursor, a one-element lookahead
//! and errors that carry the position they occurred at.
//!
//! ```
//! use jbrest::header::reader::{Event, HeaderReader, HeaderTokens};
//!
//! let mut reader = HeaderReader::new("text/html;level=\"1\"");
//! assert_eq!(reader.next().unwrap(), Event::Token);
//! assert_eq!(reader.event_value(), "text");
//! reader.next_separator('/').unwrap();
//! assert_eq!(reader.next_token().unwrap(), "html");
//! reader.next_separator(';').unwrap();
//! assert_eq!(reader.next_token().unwrap(), "level");
//! reader.next_separator('=').unwrap();
//! assert_eq!(reader.next_quoted_string().unwrap(), "1");
//! assert!(!reader.has_next());
//! ```

use indexmap::IndexMap;
use thiserror::Error;

use crate::header::grammar::{self, CharType};
use crate::header::quality::DEFAULT_QUALITY;

/// Lexical category of the most recently consumed span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Token,
    QuotedString,
    Comment,
    Separator,
    Control,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("error parsing header at position {index}: {reason}")]
pub struct ParseError {
    index: usize,
    reason: String,
}

impl ParseError {
    pub fn new(index: usize, reason: &str) -> Self {
        Self {
            index,
            reason: reason.to_string(),
        }
    }
    pub fn index(&self) -> usize {
        self.index
    }
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Header parameters keyed by lower-cased name, in wire order.
pub type Parameters = IndexMap<String, String>;

/// Token source shared by [`HeaderReader`] and [`ListAdapter`]; value parsers
/// are written against this trait so they work on a whole header or on one
/// element of a comma separated list.
pub trait HeaderTokens {
    /// Skip white space and report whether anything is left.
    fn has_next(&mut self) -> bool;
    fn has_next_separator(&mut self, separator: char, skip_white_space: bool) -> bool;
    fn next_event(&mut self, skip_white_space: bool, preserve_backslash: bool) -> Result<Event>;
    /// Read the raw characters between `start` and the next `end`.
    fn next_separated_string(&mut self, start: char, end: char) -> Result<String>;
    fn event(&self) -> Option<Event>;
    fn event_value(&self) -> &str;
    fn remainder(&self) -> Option<&str>;
    fn index(&self) -> usize;

    fn next(&mut self) -> Result<Event> {
        self.next_event(true, false)
    }

    fn next_token(&mut self) -> Result<String> {
        match self.next_event(false, false)? {
            Event::Token => Ok(self.event_value().to_string()),
            _ => Err(ParseError::new(self.index(), "next event is not a token")),
        }
    }

    fn next_separator(&mut self, separator: char) -> Result<()> {
        if self.next_event(false, false)? != Event::Separator {
            return Err(ParseError::new(
                self.index(),
                "next event is not a separator",
            ));
        }
        match self.event_value().chars().next() {
            Some(c) if c == separator => Ok(()),
            found => Err(ParseError::new(
                self.index(),
                &format!(
                    "expected separator '{}' instead of '{}'",
                    separator,
                    found.unwrap_or(' ')
                ),
            )),
        }
    }

    fn next_quoted_string(&mut self) -> Result<String> {
        match self.next_event(false, false)? {
            Event::QuotedString => Ok(self.event_value().to_string()),
            _ => Err(ParseError::new(
                self.index(),
                "next event is not a quoted string",
            )),
        }
    }

    fn next_token_or_quoted_string(&mut self, preserve_backslash: bool) -> Result<String> {
        match self.next_event(false, preserve_backslash)? {
            Event::Token | Event::QuotedString => Ok(self.event_value().to_string()),
            _ => Err(ParseError::new(
                self.index(),
                &format!(
                    "next event is not a token or a quoted string, {}",
                    self.event_value()
                ),
            )),
        }
    }
}

/// Tokenizer over a complete header value.
#[derive(Debug, Clone)]
pub struct HeaderReader<'a> {
    header: &'a str,
    process_comments: bool,
    index: usize,
    event: Option<Event>,
    value: String,
}

impl<'a> HeaderReader<'a> {
    pub fn new(header: &'a str) -> Self {
        Self {
            header,
            process_comments: false,
            index: 0,
            event: None,
            value: String::new(),
        }
    }
    /// Like [`new`](Self::new), but parenthesized comments are accepted
    /// instead of rejected.
    pub fn with_comments(header: &'a str) -> Self {
        Self {
            process_comments: true,
            ..Self::new(header)
        }
    }
    fn error(&self, reason: &str) -> ParseError {
        ParseError::new(self.index, reason)
    }
    fn byte_at(&self, index: usize) -> char {
        self.header.as_bytes()[index] as char
    }
    fn skip_white_space(&mut self) -> bool {
        while self.index < self.header.len() {
            if !grammar::is_white_space(self.byte_at(self.index)) {
                return true;
            }
            self.index += 1;
        }
        false
    }
    fn next_character(&mut self, skip_white_space: bool) -> Result<char> {
        if skip_white_space {
            self.skip_white_space();
        }
        self.header[self.index..]
            .chars()
            .next()
            .ok_or_else(|| self.error("end of header"))
    }
    fn process(&mut self, c: char, preserve_backslash: bool) -> Result<Event> {
        match grammar::char_type(c) {
            None => {
                self.index += c.len_utf8();
                self.value = c.to_string();
                Ok(Event::Control)
            }
            Some(CharType::Token) => {
                let start = self.index;
                self.index += 1;
                while self.index < self.header.len() && grammar::is_token(self.byte_at(self.index))
                {
                    self.index += 1;
                }
                self.value = self.header[start..self.index].to_string();
                Ok(Event::Token)
            }
            Some(CharType::QuotedString) => {
                self.process_quoted_string(preserve_backslash)?;
                Ok(Event::QuotedString)
            }
            Some(CharType::Comment) => {
                if !self.process_comments {
                    return Err(self.error("comments are not allowed"));
                }
                self.process_comment()?;
                Ok(Event::Comment)
            }
            Some(CharType::Separator) => {
                self.index += 1;
                self.value = c.to_string();
                Ok(Event::Separator)
            }
            Some(CharType::Control) => {
                self.index += 1;
                self.value = c.to_string();
                Ok(Event::Control)
            }
            Some(CharType::WhiteSpace) => Err(self.error("white space is not allowed")),
        }
    }
    fn process_comment(&mut self) -> Result<()> {
        let bytes = self.header.as_bytes();
        let mut filter = false;
        let mut nesting = 1;
        self.index += 1;
        let start = self.index;
        while nesting > 0 && self.index < bytes.len() {
            match bytes[self.index] {
                b'\\' => {
                    self.index += 1;
                    filter = true;
                }
                b'\r' => filter = true,
                b'(' => nesting += 1,
                b')' => nesting -= 1,
                _ => (),
            }
            self.index += 1;
        }
        if nesting != 0 {
            self.index = self.index.min(bytes.len());
            return Err(self.error("unbalanced comments"));
        }
        let comment = &self.header[start..self.index - 1];
        self.value = if filter {
            grammar::filter_token(comment, false)
        } else {
            comment.to_string()
        };
        Ok(())
    }
    fn process_quoted_string(&mut self, preserve_backslash: bool) -> Result<()> {
        let bytes = self.header.as_bytes();
        let mut filter = false;
        self.index += 1;
        let start = self.index;
        while self.index < bytes.len() {
            match bytes[self.index] {
                b'\\' if !preserve_backslash => {
                    self.index += 1;
                    filter = true;
                }
                b'\r' => filter = true,
                b'"' => {
                    let quoted = &self.header[start..self.index];
                    self.value = if filter {
                        grammar::filter_token(quoted, preserve_backslash)
                    } else {
                        quoted.to_string()
                    };
                    self.index += 1;
                    return Ok(());
                }
                _ => (),
            }
            self.index += 1;
        }
        self.index = self.index.min(bytes.len());
        Err(self.error("unbalanced quoted string"))
    }
}

impl<'a> HeaderTokens for HeaderReader<'a> {
    fn has_next(&mut self) -> bool {
        self.skip_white_space()
    }
    fn has_next_separator(&mut self, separator: char, skip_white_space: bool) -> bool {
        if skip_white_space {
            self.skip_white_space();
        }
        if self.index >= self.header.len() {
            return false;
        }
        let c = self.byte_at(self.index);
        grammar::is_separator(c) && c == separator
    }
    fn next_event(&mut self, skip_white_space: bool, preserve_backslash: bool) -> Result<Event> {
        let c = self.next_character(skip_white_space)?;
        let event = self.process(c, preserve_backslash)?;
        self.event = Some(event);
        Ok(event)
    }
    fn next_separated_string(&mut self, start: char, end: char) -> Result<String> {
        self.next_separator(start)?;
        let from = self.index;
        while self.index < self.header.len() && self.byte_at(self.index) != end {
            self.index += 1;
        }
        if from == self.index {
            return Err(self.error(&format!(
                "no characters between separators '{}' and '{}'",
                start, end
            )));
        } else if self.index == self.header.len() {
            return Err(self.error(&format!("no end separator '{}'", end)));
        }
        self.event = Some(Event::Token);
        self.value = self.header[from..self.index].to_string();
        self.index += 1;
        Ok(self.value.clone())
    }
    fn event(&self) -> Option<Event> {
        self.event
    }
    fn event_value(&self) -> &str {
        &self.value
    }
    fn remainder(&self) -> Option<&str> {
        if self.index < self.header.len() {
            Some(&self.header[self.index..])
        } else {
            None
        }
    }
    fn index(&self) -> usize {
        self.index
    }
}

/// Bounds a reader to a single element of a comma separated list: the
/// element ends at the next top-level `,`, which is left for the caller.
pub struct ListAdapter<'r, R: HeaderTokens + ?Sized> {
    reader: &'r mut R,
    terminated: bool,
}

impl<'r, R: HeaderTokens + ?Sized> ListAdapter<'r, R> {
    pub fn new(reader: &'r mut R) -> Self {
        Self {
            reader,
            terminated: false,
        }
    }
    /// Re-arm the adapter for the next list element.
    pub fn reset(&mut self) {
        self.terminated = false;
    }
    fn end_of_element(&self) -> ParseError {
        ParseError::new(self.reader.index(), "end of header")
    }
}

impl<'r, R: HeaderTokens + ?Sized> HeaderTokens for ListAdapter<'r, R> {
    fn has_next(&mut self) -> bool {
        if self.terminated {
            return false;
        }
        if self.reader.has_next() {
            if self.reader.has_next_separator(',', true) {
                self.terminated = true;
                false
            } else {
                true
            }
        } else {
            false
        }
    }
    fn has_next_separator(&mut self, separator: char, skip_white_space: bool) -> bool {
        if self.terminated {
            return false;
        }
        if self.reader.has_next_separator(',', skip_white_space) {
            self.terminated = true;
            false
        } else {
            self.reader.has_next_separator(separator, skip_white_space)
        }
    }
    fn next_event(&mut self, skip_white_space: bool, preserve_backslash: bool) -> Result<Event> {
        if self.terminated {
            return Err(self.end_of_element());
        }
        if self.reader.has_next_separator(',', skip_white_space) {
            self.terminated = true;
            return Err(self.end_of_element());
        }
        self.reader.next_event(skip_white_space, preserve_backslash)
    }
    fn next_separated_string(&mut self, start: char, end: char) -> Result<String> {
        if self.terminated {
            return Err(self.end_of_element());
        }
        if self.reader.has_next_separator(',', true) {
            self.terminated = true;
            return Err(self.end_of_element());
        }
        self.reader.next_separated_string(start, end)
    }
    fn event(&self) -> Option<Event> {
        self.reader.event()
    }
    fn event_value(&self) -> &str {
        self.reader.event_value()
    }
    fn remainder(&self) -> Option<&str> {
        self.reader.remainder()
    }
    fn index(&self) -> usize {
        self.reader.index()
    }
}

/// Parse a quality value into parts per thousand.
///
/// ```
/// use jbrest::header::reader::read_quality_factor;
///
/// assert_eq!(read_quality_factor("1").unwrap(), 1000);
/// assert_eq!(read_quality_factor("0.5").unwrap(), 500);
/// assert!(read_quality_factor("1.001").is_err());
/// ```
pub fn read_quality_factor(q: &str) -> Result<u16> {
    let bytes = q.as_bytes();
    if bytes.is_empty() {
        return Err(ParseError::new(0, "quality value cannot be empty"));
    }
    if bytes.len() > 5 {
        return Err(ParseError::new(
            0,
            "quality value is greater than the maximum length, 5",
        ));
    }
    let mut index = 0;
    let whole = bytes[index];
    index += 1;
    match whole {
        b'0' | b'1' => {
            if index == bytes.len() {
                return Ok(u16::from(whole - b'0') * 1000);
            }
            let c = bytes[index];
            index += 1;
            if c != b'.' {
                return Err(ParseError::new(
                    index,
                    &format!(
                        "a decimal place is expected rather than '{}'",
                        c as char
                    ),
                ));
            }
            if index == bytes.len() {
                return Ok(u16::from(whole - b'0') * 1000);
            }
        }
        // Not allowed by the grammar, but sent by some clients.
        b'.' => {
            if index == bytes.len() {
                return Err(ParseError::new(
                    index,
                    "a decimal numeral is expected after the decimal point",
                ));
            }
        }
        c => {
            return Err(ParseError::new(
                index,
                &format!(
                    "a decimal numeral '0' or '1' is expected rather than '{}'",
                    c as char
                ),
            ))
        }
    }

    let mut value: u16 = 0;
    let mut exponent: u16 = 100;
    while index < bytes.len() {
        let c = bytes[index];
        index += 1;
        if c.is_ascii_digit() {
            value += u16::from(c - b'0') * exponent;
            exponent /= 10;
        } else {
            return Err(ParseError::new(
                index,
                &format!("a decimal numeral is expected rather than '{}'", c as char),
            ));
        }
    }

    if whole == b'1' {
        if value > 0 {
            return Err(ParseError::new(
                index,
                &format!("the quality value, {}, is greater than 1", q),
            ));
        }
        Ok(DEFAULT_QUALITY)
    } else {
        Ok(value)
    }
}

/// Scan `;name=value` parameters for `q` and return its value, or the
/// default quality when absent.
pub fn read_quality_factor_parameter<R: HeaderTokens + ?Sized>(reader: &mut R) -> Result<u16> {
    while reader.has_next() {
        reader.next_separator(';')?;
        if !reader.has_next() {
            return Ok(DEFAULT_QUALITY);
        }
        let name = reader.next_token()?;
        reader.next_separator('=')?;
        let value = reader.next_token_or_quoted_string(false)?;
        if name.eq_ignore_ascii_case("q") {
            return read_quality_factor(&value);
        }
    }
    Ok(DEFAULT_QUALITY)
}

/// Read `;name=value` parameters in the order they appear. Names are
/// lower-cased. With
/// `file_name_fix`, a `filename` value keeps its backslashes and loses any
/// leading DOS path.
pub fn read_parameters<R: HeaderTokens + ?Sized>(
    reader: &mut R,
    file_name_fix: bool,
) -> Result<Parameters> {
    let mut parameters = Parameters::new();
    while reader.has_next() {
        reader.next_separator(';')?;
        while reader.has_next_separator(';', true) {
            reader.next()?;
        }
        if !reader.has_next() {
            break;
        }
        let name = reader.next_token()?.to_ascii_lowercase();
        reader.next_separator('=')?;
        let value = if file_name_fix && name == "filename" {
            let value = reader.next_token_or_quoted_string(true)?;
            match value.rfind('\\') {
                Some(i) => value[i + 1..].to_string(),
                None => value,
            }
        } else {
            reader.next_token_or_quoted_string(false)?
        };
        parameters.insert(name, value);
    }
    Ok(parameters)
}

#[cfg(test)]
mod test {
    use super::*;

    fn events(header: &str) -> Vec<(Event, String)> {
        let mut reader = HeaderReader::with_comments(header);
        let mut out = vec![];
        while reader.has_next() {
            let event = reader.next().unwrap();
            out.push((event, reader.event_value().to_string()));
        }
        out
    }

    #[test]
    fn test_tokenize_media_type() {
        assert_eq!(
            events("text/html; charset=\"utf-8\""),
            vec![
                (Event::Token, "text".to_string()),
                (Event::Separator, "/".to_string()),
                (Event::Token, "html".to_string()),
                (Event::Separator, ";".to_string()),
                (Event::Token, "charset".to_string()),
                (Event::Separator, "=".to_string()),
                (Event::QuotedString, "utf-8".to_string()),
            ]
        );
    }

    #[test]
    fn test_quoted_string_escapes() {
        let mut reader = HeaderReader::new("\"a \\\"quoted\\\" word\"");
        assert_eq!(reader.next_quoted_string().unwrap(), "a \"quoted\" word");
        assert_eq!(reader.index(), 19);
        assert!(reader.remainder().is_none());
    }

    #[test]
    fn test_nested_comment() {
        assert_eq!(
            events("Mozilla (X11; (nested) comment)"),
            vec![
                (Event::Token, "Mozilla".to_string()),
                (Event::Comment, "X11; (nested) comment".to_string()),
            ]
        );
    }

    #[test]
    fn test_comments_rejected_by_default() {
        let mut reader = HeaderReader::new("(comment)");
        assert_eq!(
            reader.next().unwrap_err(),
            ParseError::new(0, "comments are not allowed")
        );
    }

    #[test]
    fn test_unbalanced() {
        let mut reader = HeaderReader::new("\"open");
        assert_eq!(
            reader.next().unwrap_err(),
            ParseError::new(5, "unbalanced quoted string")
        );
        let mut reader = HeaderReader::with_comments("(open (inner)");
        assert_eq!(reader.next().unwrap_err().reason(), "unbalanced comments");
    }

    #[test]
    fn test_non_ascii_is_control() {
        let mut reader = HeaderReader::new("é");
        assert_eq!(reader.next().unwrap(), Event::Control);
        assert_eq!(reader.event_value(), "é");
        assert!(!reader.has_next());
    }

    #[test]
    fn test_end_of_header() {
        let mut reader = HeaderReader::new("  ");
        assert!(!reader.has_next());
        assert_eq!(reader.next().unwrap_err(), ParseError::new(2, "end of header"));
    }

    #[test]
    fn test_separated_string() {
        let mut reader = HeaderReader::new("<http://example.com/a>; rel=next");
        assert_eq!(
            reader.next_separated_string('<', '>').unwrap(),
            "http://example.com/a"
        );
        assert_eq!(reader.remainder(), Some("; rel=next"));

        let mut reader = HeaderReader::new("<>");
        assert!(reader.next_separated_string('<', '>').is_err());
        let mut reader = HeaderReader::new("<abc");
        assert_eq!(
            reader.next_separated_string('<', '>').unwrap_err().reason(),
            "no end separator '>'"
        );
    }

    #[test]
    fn test_list_adapter_stops_at_comma() {
        let mut reader = HeaderReader::new("a;b=1, c");
        {
            let mut adapter = ListAdapter::new(&mut reader);
            assert_eq!(adapter.next_token().unwrap(), "a");
            assert!(adapter.has_next());
            adapter.next_separator(';').unwrap();
            adapter.next_token().unwrap();
            adapter.next_separator('=').unwrap();
            adapter.next_token().unwrap();
            assert!(!adapter.has_next());
            assert!(adapter.next().is_err());
            adapter.reset();
            assert!(!adapter.has_next());
        }
        reader.next_separator(',').unwrap();
        assert!(reader.has_next());
        assert_eq!(reader.next_token().unwrap(), "c");
    }

    #[test]
    fn test_quality_factor() {
        assert_eq!(read_quality_factor("1").unwrap(), 1000);
        assert_eq!(read_quality_factor("1.").unwrap(), 1000);
        assert_eq!(read_quality_factor("1.0").unwrap(), 1000);
        assert_eq!(read_quality_factor("1.000").unwrap(), 1000);
        assert_eq!(read_quality_factor("0.5").unwrap(), 500);
        assert_eq!(read_quality_factor("0.123").unwrap(), 123);
        assert_eq!(read_quality_factor(".8").unwrap(), 800);
        assert_eq!(read_quality_factor("0").unwrap(), 0);
    }

    #[test]
    fn test_quality_factor_errors() {
        assert_eq!(
            read_quality_factor("1.001").unwrap_err().reason(),
            "the quality value, 1.001, is greater than 1"
        );
        assert!(read_quality_factor("2").is_err());
        assert!(read_quality_factor("").is_err());
        assert!(read_quality_factor("0.5000").is_err());
        assert!(read_quality_factor("0,5").is_err());
        assert!(read_quality_factor("0.x").is_err());
        assert!(read_quality_factor(".").is_err());
    }

    #[test]
    fn test_quality_factor_parameter() {
        let mut reader = HeaderReader::new(";level=1; Q=0.3");
        assert_eq!(read_quality_factor_parameter(&mut reader).unwrap(), 300);
        let mut reader = HeaderReader::new(";level=1");
        assert_eq!(read_quality_factor_parameter(&mut reader).unwrap(), 1000);
        let mut reader = HeaderReader::new(";");
        assert_eq!(read_quality_factor_parameter(&mut reader).unwrap(), 1000);
    }

    #[test]
    fn test_read_parameters() {
        let mut reader = HeaderReader::new(";; Charset=utf-8 ; name=\"a b\";");
        let parameters = read_parameters(&mut reader, false).unwrap();
        assert_eq!(parameters.len(), 2);
        assert_eq!(parameters["charset"], "utf-8");
        assert_eq!(parameters["name"], "a b");
        let mut reader = HeaderReader::new(";z=1;a=2;m=3");
        let names: Vec<_> = read_parameters(&mut reader, false)
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_read_parameters_file_name_fix() {
        let mut reader = HeaderReader::new("; filename=\"C:\\docs\\report.txt\"");
        let parameters = read_parameters(&mut reader, true).unwrap();
        assert_eq!(parameters["filename"], "report.txt");
    }
}
