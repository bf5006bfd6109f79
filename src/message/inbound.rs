//! Inbound messages: received requests on a server, received responses on a
//! client.
use std::any::Any;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use log::debug;
use once_cell::unsync::OnceCell;

use crate::config::Configuration;
use crate::content::MessageBodyWorkers;
use crate::header::list::{
    read_accept_language, read_accept_media_type, read_accept_token, read_matching_entity_tags,
};
use crate::header::reader::ParseError;
use crate::header::{
    self, AcceptableLanguageTag, AcceptableMediaType, AcceptableToken, EntityTagMatch, HeaderMap,
    HeaderParseError, MediaType,
};
use crate::io::EntityInputStream;
use crate::message::chunked::{ChunkParser, ChunkedInput};
use crate::message::interceptor::{ReaderInterceptor, ReaderInterceptorContext};
use crate::message::{
    Direction, EntityType, HeaderMethods, MessageError, PropertiesDelegate, Result,
};

const CLOSED: &str = "Entity input stream has already been closed.";

enum EntityContent {
    /// No entity stream was ever set.
    Empty(EntityInputStream),
    /// Readable once.
    Streaming(EntityInputStream),
    /// Held in memory, re-read from the start on every read.
    Buffered {
        data: Arc<[u8]>,
        stream: EntityInputStream,
    },
    Closed,
}

impl EntityContent {
    fn stream(&mut self) -> Result<&mut EntityInputStream> {
        match self {
            EntityContent::Empty(stream) | EntityContent::Streaming(stream) => Ok(stream),
            EntityContent::Buffered { stream, .. } => Ok(stream),
            EntityContent::Closed => Err(MessageError::IllegalState(CLOSED.to_string())),
        }
    }
    fn close(&mut self) {
        match std::mem::replace(self, EntityContent::Closed) {
            EntityContent::Empty(mut stream) | EntityContent::Streaming(mut stream) => {
                stream.close()
            }
            EntityContent::Buffered { mut stream, .. } => stream.close(),
            EntityContent::Closed => {}
        }
    }
}

/// Headers and entity of an inbound message.
///
/// The entity stream moves through the states *no entity* (initial),
/// *streaming* (after [`set_entity_stream`](Self::set_entity_stream)),
/// *buffered* (after [`buffer_entity`](Self::buffer_entity)) and *closed*.
/// Reading a streaming entity consumes and closes it; a buffered entity can
/// be read any number of times. Anything but [`close`](Self::close) fails on
/// a closed context.
///
/// ```
/// use std::sync::Arc;
/// use jbrest::content::MessageBodyWorkers;
/// use jbrest::io::EntityInputStream;
/// use jbrest::message::inbound::InboundMessageContext;
/// use jbrest::message::MapPropertiesDelegate;
///
/// let mut ctx = InboundMessageContext::default()
///     .with_workers(Arc::new(MessageBodyWorkers::with_builtins()));
/// ctx.header("Content-Type", "text/plain");
/// ctx.set_entity_stream(EntityInputStream::new(&b"42"[..]));
/// ctx.buffer_entity().unwrap();
/// let mut properties = MapPropertiesDelegate::new();
/// assert_eq!(ctx.read_entity::<u32>(&mut properties).unwrap(), Some(42));
/// assert_eq!(ctx.read_entity::<String>(&mut properties).unwrap(), Some("42".into()));
/// ctx.close();
/// assert!(ctx.read_entity::<u32>(&mut properties).is_err());
/// ```
pub struct InboundMessageContext {
    headers: HeaderMap<String>,
    content: EntityContent,
    workers: Option<Arc<MessageBodyWorkers>>,
    interceptors: Vec<Arc<dyn ReaderInterceptor>>,
    configuration: Configuration,
    media_type: OnceCell<Option<MediaType>>,
    acceptable_media_types: OnceCell<Vec<AcceptableMediaType>>,
}

impl Default for InboundMessageContext {
    fn default() -> Self {
        Self::new(Configuration::default())
    }
}

impl InboundMessageContext {
    pub fn new(configuration: Configuration) -> Self {
        let mut headers = HeaderMap::new();
        headers.set_guard(header::CONTENT_TYPE);
        headers.set_guard(header::ACCEPT);
        Self {
            headers,
            content: EntityContent::Empty(EntityInputStream::empty()),
            workers: None,
            interceptors: vec![],
            configuration,
            media_type: OnceCell::new(),
            acceptable_media_types: OnceCell::new(),
        }
    }
    pub fn with_workers(mut self, workers: Arc<MessageBodyWorkers>) -> Self {
        self.workers = Some(workers);
        self
    }
    pub fn with_reader_interceptors(
        mut self,
        interceptors: Vec<Arc<dyn ReaderInterceptor>>,
    ) -> Self {
        self.interceptors = interceptors;
        self
    }
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }
    pub fn workers(&self) -> Option<&Arc<MessageBodyWorkers>> {
        self.workers.as_ref()
    }
    pub fn set_workers(&mut self, workers: Option<Arc<MessageBodyWorkers>>) {
        self.workers = workers;
    }
    pub fn reader_interceptors(&self) -> &[Arc<dyn ReaderInterceptor>] {
        &self.interceptors
    }

    /// Add a header value.
    pub fn header<V: fmt::Display>(&mut self, name: &str, value: V) -> &mut Self {
        self.headers.add(name, value.to_string());
        self
    }
    pub fn add_header_values<V: fmt::Display>(&mut self, name: &str, values: &[V]) -> &mut Self {
        for value in values {
            self.headers.add(name, value.to_string());
        }
        self
    }
    /// Add every header of `headers`.
    pub fn add_headers(&mut self, headers: &HeaderMap<String>) -> &mut Self {
        for (name, values) in headers.iter() {
            self.headers.add_all(name.as_str(), values.to_vec());
        }
        self
    }
    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.headers.remove(name);
        self
    }
    pub fn headers(&self) -> &HeaderMap<String> {
        &self.headers
    }
    pub fn headers_mut(&mut self) -> &mut HeaderMap<String> {
        &mut self.headers
    }

    fn header_error(&self, name: &str, value: &str, e: &ParseError) -> MessageError {
        MessageError::header_value(
            name,
            value,
            Direction::Inbound,
            HeaderParseError::from_parse(name, value, e),
        )
    }

    fn non_empty_header(&self, name: &str) -> Option<String> {
        self.header_string(name).filter(|value| !value.is_empty())
    }

    /// `If-Match`, `None` when absent.
    pub fn if_match(&self) -> Result<Option<EntityTagMatch>> {
        self.matching_entity_tags(header::IF_MATCH)
    }
    /// `If-None-Match`, `None` when absent.
    pub fn if_none_match(&self) -> Result<Option<EntityTagMatch>> {
        self.matching_entity_tags(header::IF_NONE_MATCH)
    }
    fn matching_entity_tags(&self, name: &str) -> Result<Option<EntityTagMatch>> {
        match self.non_empty_header(name) {
            None => Ok(None),
            Some(value) => read_matching_entity_tags(&value)
                .map(Some)
                .map_err(|e| self.header_error(name, &value, &e)),
        }
    }

    /// Media type of the entity from `Content-Type`, `None` when absent.
    pub fn media_type(&mut self) -> Result<Option<MediaType>> {
        if self.headers.is_observed_and_reset(header::CONTENT_TYPE) {
            self.media_type.take();
        }
        let headers = &self.headers;
        self.media_type
            .get_or_try_init(|| {
                let ctx = HeadersOnly(headers);
                ctx.single_header_as(header::CONTENT_TYPE, |value| value.parse())
            })
            .map(Option::clone)
    }

    /// `Accept` media types, best first. Missing or empty means `*/*`.
    pub fn qualified_acceptable_media_types(&mut self) -> Result<Vec<AcceptableMediaType>> {
        if self.headers.is_observed_and_reset(header::ACCEPT) {
            self.acceptable_media_types.take();
        }
        let value = self.non_empty_header(header::ACCEPT);
        let acceptable = self.acceptable_media_types.get_or_try_init(|| match &value {
            None => Ok(vec![AcceptableMediaType::from(MediaType::wildcard())]),
            Some(value) => read_accept_media_type(value).map_err(|e| (value.clone(), e)),
        });
        match acceptable {
            Ok(acceptable) => Ok(acceptable.clone()),
            Err((value, e)) => Err(self.header_error(header::ACCEPT, &value, &e)),
        }
    }

    /// `Accept-Language` tags, best first. Missing or empty means `*`.
    pub fn qualified_acceptable_languages(&self) -> Result<Vec<AcceptableLanguageTag>> {
        match self.non_empty_header(header::ACCEPT_LANGUAGE) {
            None => Ok(vec![AcceptableLanguageTag::wildcard()]),
            Some(value) => read_accept_language(&value)
                .map_err(|e| self.header_error(header::ACCEPT_LANGUAGE, &value, &e)),
        }
    }

    pub fn qualified_accept_charset(&self) -> Result<Vec<AcceptableToken>> {
        self.acceptable_tokens(header::ACCEPT_CHARSET)
    }

    pub fn qualified_accept_encoding(&self) -> Result<Vec<AcceptableToken>> {
        self.acceptable_tokens(header::ACCEPT_ENCODING)
    }

    fn acceptable_tokens(&self, name: &str) -> Result<Vec<AcceptableToken>> {
        match self.non_empty_header(name) {
            None => Ok(vec![AcceptableToken::wildcard()]),
            Some(value) => read_accept_token(&value).map_err(|e| self.header_error(name, &value, &e)),
        }
    }

    /// True if there is an entity to read.
    pub fn has_entity(&mut self) -> Result<bool> {
        match &mut self.content {
            EntityContent::Closed => Err(MessageError::IllegalState(CLOSED.to_string())),
            EntityContent::Buffered { .. } => Ok(true),
            EntityContent::Empty(stream) | EntityContent::Streaming(stream) => {
                Ok(!stream.is_empty().unwrap_or(true))
            }
        }
    }

    pub fn entity_stream(&mut self) -> Result<&mut EntityInputStream> {
        self.content.stream()
    }

    /// Replace the entity stream; the context is streaming afterwards.
    pub fn set_entity_stream(&mut self, input: EntityInputStream) {
        self.content = EntityContent::Streaming(input);
    }

    /// Read the whole entity into memory so it can be read more than once.
    /// Does nothing when already buffered or when there is no entity.
    pub fn buffer_entity(&mut self) -> Result<()> {
        let mut stream = match std::mem::replace(&mut self.content, EntityContent::Closed) {
            EntityContent::Closed => {
                return Err(MessageError::IllegalState(CLOSED.to_string()));
            }
            EntityContent::Streaming(stream) => stream,
            other => {
                self.content = other;
                return Ok(());
            }
        };
        let data = stream.read_all();
        stream.close();
        let data: Arc<[u8]> = data
            .map_err(|e| MessageError::processing_caused_by("message content buffering failed", e))?
            .into();
        self.content = EntityContent::Buffered {
            stream: EntityInputStream::new(Cursor::new(data.clone())),
            data,
        };
        Ok(())
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self.content, EntityContent::Buffered { .. })
    }

    /// Read the entity as `T` through the reader interceptors and the body
    /// reader for `T` and the entity media type (`application/octet-stream`
    /// when unspecified). `None` when there are no workers or no entity.
    pub fn read_entity<T: Any>(
        &mut self,
        properties: &mut dyn PropertiesDelegate,
    ) -> Result<Option<T>> {
        if let EntityContent::Buffered { data, stream } = &mut self.content {
            *stream = EntityInputStream::new(Cursor::new(data.clone()));
        }
        self.content.stream()?;
        let workers = match &self.workers {
            Some(workers) => workers.clone(),
            None => return Ok(None),
        };
        let media_type = self
            .media_type()?
            .unwrap_or_else(MediaType::application_octet_stream);
        let entity_type = EntityType::of::<T>();
        let has_content = !matches!(self.content, EntityContent::Empty(_));
        let buffered = self.is_buffered();
        let no_interceptors: &[Arc<dyn ReaderInterceptor>] = &[];
        let interceptors = if has_content {
            &self.interceptors[..]
        } else {
            no_interceptors
        };
        let input = self.content.stream()?;
        let result = ReaderInterceptorContext::new(
            interceptors,
            &workers,
            entity_type,
            media_type,
            &mut self.headers,
            properties,
            input,
        )
        .with_translate_no_content(self.configuration.translates_no_content())
        .with_tracing(self.configuration.tracing)
        .proceed();
        if !buffered {
            self.content.close();
        }
        let entity = match result {
            Ok(Some(entity)) => entity,
            Ok(None) => return Ok(None),
            Err(MessageError::Io(e)) => {
                return Err(MessageError::processing_caused_by(
                    "error reading entity from input stream",
                    e,
                ))
            }
            Err(e) => return Err(e),
        };
        entity
            .downcast::<T>()
            .map(|t| Some(*t))
            .map_err(|_| {
                MessageError::processing(&format!("entity was not read as {}", entity_type))
            })
    }

    /// Hand the entity stream to a [`ChunkedInput`] reading chunks as the
    /// entity media type. The context is closed afterwards.
    pub fn chunked_input<P: ChunkParser + 'static>(&mut self, parser: P) -> Result<ChunkedInput> {
        let media_type = self
            .media_type()?
            .unwrap_or_else(MediaType::application_octet_stream);
        let input = self.content.stream()?.detach();
        self.content.close();
        Ok(ChunkedInput::new(input, parser)
            .with_media_type(media_type)
            .with_headers(self.headers.clone())
            .with_interceptors(self.interceptors.clone()))
    }

    /// Close the entity stream, buffered or not, and drop the workers.
    /// Idempotent.
    pub fn close(&mut self) {
        if !matches!(self.content, EntityContent::Closed) {
            debug!("closing inbound entity stream");
        }
        self.content.close();
        self.workers = None;
    }
    pub fn is_closed(&self) -> bool {
        matches!(self.content, EntityContent::Closed)
    }
}

impl HeaderMethods for InboundMessageContext {
    fn header_values(&self, name: &str) -> Option<Vec<String>> {
        self.headers.get(name).map(|values| values.to_vec())
    }
    fn direction(&self) -> Direction {
        Direction::Inbound
    }
}

/// Header access while the context itself is mutably borrowed.
struct HeadersOnly<'a>(&'a HeaderMap<String>);

impl<'a> HeaderMethods for HeadersOnly<'a> {
    fn header_values(&self, name: &str) -> Option<Vec<String>> {
        self.0.get(name).map(|values| values.to_vec())
    }
    fn direction(&self) -> Direction {
        Direction::Inbound
    }
}

impl fmt::Debug for InboundMessageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.content {
            EntityContent::Empty(_) => "empty",
            EntityContent::Streaming(_) => "streaming",
            EntityContent::Buffered { .. } => "buffered",
            EntityContent::Closed => "closed",
        };
        f.debug_struct("InboundMessageContext")
            .field("headers", &self.headers)
            .field("entity", &state)
            .finish()
    }
}
