//! HTTP/1.x message heads: the request or status line and the header
//! fields in front of the entity.
use std::fmt;
use std::io::{self, Read, Write};

use log::trace;
use thiserror::Error;

use crate::config::Configuration;
use crate::header::{self, grammar, HeaderMap};
use crate::io::{chain_buffer, EntityInputStream};
use crate::message::inbound::InboundMessageContext;

const HEAD_PARSER_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Http10 => f.write_str("HTTP/1.0"),
            Version::Http11 => f.write_str("HTTP/1.1"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request {
        method: String,
        target: String,
        version: Version,
    },
    Status {
        version: Version,
        code: u16,
        reason: String,
    },
}

impl StartLine {
    pub fn request(method: &str, target: &str) -> Self {
        StartLine::Request {
            method: method.to_string(),
            target: target.to_string(),
            version: Version::Http11,
        }
    }
    pub fn status(code: u16, reason: &str) -> Self {
        StartLine::Status {
            version: Version::Http11,
            code,
            reason: reason.to_string(),
        }
    }
    pub fn is_request(&self) -> bool {
        matches!(self, StartLine::Request { .. })
    }
}

impl fmt::Display for StartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartLine::Request {
                method,
                target,
                version,
            } => write!(f, "{} {} {}", method, target, version),
            StartLine::Status {
                version,
                code,
                reason,
            } => write!(f, "{} {} {}", version, code, reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageHead {
    pub start_line: StartLine,
    pub headers: HeaderMap<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("error parsing message head at position {position}: {reason}")]
pub struct HeadParseError {
    position: usize,
    reason: String,
}

impl HeadParseError {
    pub fn new(position: usize, reason: &str) -> Self {
        Self {
            position,
            reason: reason.to_string(),
        }
    }
    pub fn position(&self) -> usize {
        self.position
    }
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

pub type Result<T> = std::result::Result<T, HeadParseError>;

fn is_token(c: u8) -> bool {
    c.is_ascii() && grammar::is_token(c as char)
}

fn is_white_space(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

fn is_target(c: u8) -> bool {
    c.is_ascii_graphic()
}

/// Reads one message head off a stream, without reading past it. The
/// rest of the stream is the entity, see
/// [`into_inbound_context`](Self::into_inbound_context).
///
/// ```
/// use jbrest::message::head::{HeadParser, StartLine};
/// use jbrest::message::HeaderMethods;
///
/// let bytes = &b"POST /items HTTP/1.1\r\nContent-Length: 3\r\nContent-Type: text/plain\r\n\r\nabcdef"[..];
/// let mut parser = HeadParser::new(bytes);
/// let head = parser.parse_request().unwrap();
/// assert_eq!(head.start_line, StartLine::request("POST", "/items"));
/// let mut ctx = parser.into_inbound_context(head, Default::default()).unwrap();
/// assert_eq!(ctx.length().unwrap(), Some(3));
/// assert_eq!(ctx.entity_stream().unwrap().read_all().unwrap(), b"abc".to_vec());
/// ```
pub struct HeadParser<R: Read> {
    buffer: [u8; HEAD_PARSER_BUFFER_SIZE],
    buffer_position: usize,
    buffer_read_size: usize,
    peek: Option<u8>,
    stream_position: usize,
    eof: bool,
    stream: R,
}

impl<R: Read> HeadParser<R> {
    pub fn new(stream: R) -> Self {
        Self {
            buffer: [0; HEAD_PARSER_BUFFER_SIZE],
            buffer_position: 0,
            buffer_read_size: 0,
            peek: None,
            stream_position: 0,
            eof: false,
            stream,
        }
    }
    /// Errors point at the peeked byte.
    fn error(&self, reason: &str) -> HeadParseError {
        let position = match self.peek {
            Some(_) => self.stream_position - 1,
            None => self.stream_position,
        };
        HeadParseError::new(position, reason)
    }
    fn read(&mut self) -> Result<()> {
        self.buffer_read_size = loop {
            match self.stream.read(&mut self.buffer) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.error(&e.to_string())),
            }
        };
        self.buffer_position = 0;
        Ok(())
    }
    /// Return the peeked byte and peek the next one. Once `eof` is set
    /// nothing more is read from the stream.
    fn next(&mut self) -> Result<Option<u8>> {
        let curr = self.peek;
        if self.eof {
            self.peek = None;
            return Ok(curr);
        }
        if self.buffer_position == self.buffer_read_size {
            self.read()?;
        }
        if self.buffer_position == self.buffer_read_size {
            self.peek = None;
        } else {
            self.peek = Some(self.buffer[self.buffer_position]);
            self.buffer_position += 1;
            self.stream_position += 1;
        }
        Ok(curr)
    }
    fn expect(&mut self, b: u8) -> Result<()> {
        if self.peek == Some(b) {
            self.next()?;
            Ok(())
        } else {
            Err(self.error(&format!("expected {:?}", b as char)))
        }
    }
    fn expects(&mut self, bs: &[u8]) -> Result<()> {
        for b in bs {
            self.expect(*b)?;
        }
        Ok(())
    }
    fn star<F: Fn(u8) -> bool>(&mut self, predicate: F) -> Result<Vec<u8>> {
        let mut out = vec![];
        while let Some(peek) = self.peek {
            if !predicate(peek) {
                break;
            }
            out.push(peek);
            self.next()?;
        }
        Ok(out)
    }
    fn plus<F: Fn(u8) -> bool>(&mut self, predicate: F, what: &str) -> Result<Vec<u8>> {
        let out = self.star(predicate)?;
        if out.is_empty() {
            return Err(self.error(&format!("expected {}", what)));
        }
        Ok(out)
    }
    fn space(&mut self) -> Result<()> {
        self.plus(is_white_space, "white space").map(|_| ())
    }
    fn crlf(&mut self) -> Result<()> {
        self.expects(b"\r\n")
    }
    fn until_cr(&mut self) -> Result<Vec<u8>> {
        let mut out = vec![];
        while self.peek != Some(b'\r') {
            match self.next()? {
                Some(b) => out.push(b),
                None => return Err(self.error("unexpected end of input")),
            }
        }
        Ok(out)
    }
    fn text(&self, bytes: Vec<u8>) -> Result<String> {
        String::from_utf8(bytes).map_err(|e| self.error(&e.to_string()))
    }
    fn version(&mut self) -> Result<Version> {
        self.expects(b"HTTP/")?;
        let version = match self.peek {
            Some(b'1') => {
                self.next()?;
                self.expect(b'.')?;
                match self.peek {
                    Some(b'0') => Version::Http10,
                    Some(b'1') => Version::Http11,
                    _ => return Err(self.error("unsupported HTTP version")),
                }
            }
            _ => return Err(self.error("unsupported HTTP version")),
        };
        self.next()?;
        Ok(version)
    }
    fn start(&mut self) -> Result<()> {
        if self.stream_position == 0 {
            self.next()?;
        }
        if self.peek.is_none() {
            return Err(self.error("unexpected end of input"));
        }
        Ok(())
    }

    /// Header fields up to and including the empty line.
    fn headers(&mut self) -> Result<HeaderMap<String>> {
        let mut headers = HeaderMap::new();
        while self.peek != Some(b'\r') {
            if self.peek.map_or(false, is_white_space) {
                return Err(self.error("obsolete line folding is not supported"));
            }
            let name = self.plus(is_token, "header name")?;
            let name = self.text(name)?;
            self.expect(b':')?;
            self.star(is_white_space)?;
            let value = self.until_cr()?;
            let value = self.text(value)?;
            self.crlf()?;
            headers.add(&name, value.trim_end_matches(|c| c == ' ' || c == '\t').to_string());
        }
        self.expect(b'\r')?;
        self.eof = true;
        self.expect(b'\n')?;
        Ok(headers)
    }

    /// `method SP request-target SP HTTP-version CRLF` and the headers.
    pub fn parse_request(&mut self) -> Result<MessageHead> {
        self.start()?;
        let method = self.plus(is_token, "method")?;
        let method = self.text(method)?;
        self.space()?;
        let target = self.plus(is_target, "request target")?;
        let target = self.text(target)?;
        self.space()?;
        let version = self.version()?;
        self.crlf()?;
        let headers = self.headers()?;
        trace!("parsed request head {} {} {}", method, target, version);
        Ok(MessageHead {
            start_line: StartLine::Request {
                method,
                target,
                version,
            },
            headers,
        })
    }

    /// `HTTP-version SP status-code SP reason-phrase CRLF` and the headers.
    pub fn parse_response(&mut self) -> Result<MessageHead> {
        self.start()?;
        let version = self.version()?;
        self.space()?;
        let code = self.plus(|c| c.is_ascii_digit(), "status code")?;
        if code.len() != 3 {
            return Err(self.error("status code must have 3 digits"));
        }
        let code = self
            .text(code)?
            .parse::<u16>()
            .map_err(|e| self.error(&e.to_string()))?;
        self.star(is_white_space)?;
        let reason = self.until_cr()?;
        let reason = self.text(reason)?;
        self.crlf()?;
        let headers = self.headers()?;
        trace!("parsed response head {} {} {}", version, code, reason);
        Ok(MessageHead {
            start_line: StartLine::Status {
                version,
                code,
                reason,
            },
            headers,
        })
    }
}

impl<R: Read + Send + 'static> HeadParser<R> {
    /// An inbound context with the headers of `head` whose entity is the
    /// rest of the stream. The entity is bounded by `Content-Length` when
    /// present; a request without one has no entity, a response without
    /// one runs to the end of the stream.
    pub fn into_inbound_context(
        self,
        head: MessageHead,
        configuration: Configuration,
    ) -> Result<InboundMessageContext> {
        let content_length = match head.headers.first(header::CONTENT_LENGTH) {
            Some(length) => Some(
                length
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| self.error("invalid content-length"))?,
            ),
            None => None,
        };
        let buffered = self.buffer[self.buffer_position..self.buffer_read_size].to_vec();
        let rest = chain_buffer(buffered, self.stream);
        let mut ctx = InboundMessageContext::new(configuration);
        ctx.add_headers(&head.headers);
        match (content_length, head.start_line.is_request()) {
            (Some(0), _) | (None, true) => {}
            (Some(length), _) => ctx.set_entity_stream(EntityInputStream::new(rest.take(length))),
            (None, false) => ctx.set_entity_stream(EntityInputStream::new(rest)),
        }
        Ok(ctx)
    }
}

/// Write a message head: the start line, one line per header value and
/// the empty line.
pub fn write_head(
    out: &mut dyn Write,
    start_line: &StartLine,
    headers: &HeaderMap<String>,
) -> io::Result<()> {
    let mut bytes = format!("{}\r\n", start_line).into_bytes();
    for (name, values) in headers.iter() {
        for value in values {
            bytes.extend(format!("{}: {}\r\n", name, value).into_bytes());
        }
    }
    bytes.extend(b"\r\n");
    out.write_all(&bytes)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::content::MessageBodyWorkers;
    use crate::header::{HeaderValue, MediaType};
    use crate::message::outbound::OutboundMessageContext;
    use crate::message::{HeaderMethods, MapPropertiesDelegate};

    fn parse_error(bytes: &'static [u8]) -> HeadParseError {
        match HeadParser::new(bytes).parse_request() {
            Ok(_) => panic!("should have errored"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_parse_request() {
        let mut parser = HeadParser::new(
            &b"GET /path?p1=v1#f HTTP/1.0\r\nHost: localhost\r\nAccept:  text/plain \r\n\r\n"[..],
        );
        let head = parser.parse_request().unwrap();
        assert_eq!(
            head.start_line,
            StartLine::Request {
                method: "GET".to_string(),
                target: "/path?p1=v1#f".to_string(),
                version: Version::Http10,
            }
        );
        assert_eq!(head.headers.first("host"), Some(&"localhost".to_string()));
        assert_eq!(head.headers.first("accept"), Some(&"text/plain".to_string()));
        let mut ctx = parser
            .into_inbound_context(head, Configuration::default())
            .unwrap();
        assert!(!ctx.has_entity().unwrap());
    }

    #[test]
    fn test_parse_response_entity_to_end() {
        let mut parser = HeadParser::new(&b"HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\n\r\nmissing"[..]);
        let head = parser.parse_response().unwrap();
        assert_eq!(head.start_line, StartLine::status(404, "Not Found"));
        let mut ctx = parser
            .into_inbound_context(head, Configuration::client())
            .unwrap()
            .with_workers(Arc::new(MessageBodyWorkers::with_builtins()));
        assert_eq!(ctx.media_type().unwrap(), Some(MediaType::text_plain()));
        let entity = ctx.read_entity::<String>(&mut MapPropertiesDelegate::new());
        assert_eq!(entity.unwrap(), Some("missing".to_string()));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_error(b"").reason(), "unexpected end of input");
        let e = parse_error(b"GET / HTTP/2.0\r\n\r\n");
        assert_eq!((e.position(), e.reason()), (11, "unsupported HTTP version"));
        assert_eq!(
            parse_error(b"GET / HTTP/1.1\r\nHost: a\r\n folded\r\n\r\n").reason(),
            "obsolete line folding is not supported"
        );
        assert_eq!(parse_error(b"GET \r\n\r\n").reason(), "expected request target");
        let e = HeadParser::new(&b"HTTP/1.1 20 OK\r\n\r\n"[..])
            .parse_response()
            .unwrap_err();
        assert_eq!(e.reason(), "status code must have 3 digits");
        let mut parser = HeadParser::new(&b"PUT / HTTP/1.1\r\nContent-Length: x\r\n\r\n"[..]);
        let head = parser.parse_request().unwrap();
        assert!(parser.into_inbound_context(head, Configuration::default()).is_err());
    }

    #[test]
    fn test_write_head() {
        let mut headers = HeaderMap::new();
        headers.add("Connection", "closed".to_string());
        headers.add("Content-Length", "7".to_string());
        let mut out = vec![];
        write_head(&mut out, &StartLine::status(500, "Internal Server Error"), &headers).unwrap();
        assert_eq!(
            out,
            b"HTTP/1.1 500 Internal Server Error\r\nConnection: closed\r\nContent-Length: 7\r\n\r\n"
                .to_vec()
        );
    }

    #[test]
    fn test_outbound_round_trip() {
        let wire = Arc::new(Mutex::new(vec![]));
        let mut ctx = OutboundMessageContext::default()
            .with_workers(Arc::new(MessageBodyWorkers::with_builtins()));
        ctx.enable_buffering().unwrap();
        ctx.set_media_type(MediaType::text_plain());
        ctx.set_entity("hello".to_string());
        let headers = ctx.string_headers();
        let provider_wire = wire.clone();
        ctx.set_stream_provider(move |length: Option<usize>| -> io::Result<Box<dyn Write + Send>> {
            let mut headers = headers.clone();
            if let Some(length) = length {
                headers.put_single(header::CONTENT_LENGTH, length.to_string());
            }
            let mut head = vec![];
            write_head(&mut head, &StartLine::status(200, "OK"), &headers)?;
            provider_wire.lock().extend(head);
            Ok(Box::new(WireWriter(provider_wire.clone())))
        });
        ctx.write_entity(&mut MapPropertiesDelegate::new()).unwrap();
        ctx.close();

        let bytes = wire.lock().clone();
        let mut parser = HeadParser::new(io::Cursor::new(bytes));
        let head = parser.parse_response().unwrap();
        let mut inbound = parser
            .into_inbound_context(head, Configuration::client())
            .unwrap()
            .with_workers(Arc::new(MessageBodyWorkers::with_builtins()));
        assert_eq!(inbound.length().unwrap(), Some(5));
        let entity = inbound.read_entity::<String>(&mut MapPropertiesDelegate::new());
        assert_eq!(entity.unwrap(), Some("hello".to_string()));
        assert!(ctx
            .headers()
            .first("content-type")
            .and_then(HeaderValue::as_media_type)
            .is_some());
    }

    struct WireWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for WireWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
