//! Outbound messages: requests sent by a client, responses sent by a
//! server.
use std::any::Any;
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, warn};
use once_cell::unsync::OnceCell;
use parking_lot::{Mutex, MutexGuard};

use crate::config::Configuration;
use crate::content::MessageBodyWorkers;
use crate::header::list::{read_accept_language, read_accept_media_type};
use crate::header::{
    self, AcceptableLanguageTag, AcceptableMediaType, HeaderMap, HeaderParseError, HeaderValue,
    MediaType, DEFAULT_QUALITY,
};
use crate::message::committing::{CommittingWriter, StreamProvider};
use crate::message::interceptor::{WriterInterceptor, WriterInterceptorContext};
use crate::message::{
    Direction, Entity, EntityType, HeaderMethods, MessageError, PropertiesDelegate, Result,
};

const CLOSED: &str = "outbound message context is closed";

/// Headers and entity of an outbound message.
///
/// Header values are kept typed until they are written. The entity is
/// written through the writer interceptors and the body writers to the
/// entity stream, which ends in a
/// [`CommittingOutputStream`](crate::message::committing::CommittingOutputStream): the real
/// output stream is only opened on commit, so headers can still change
/// until the first bytes go out.
///
/// ```
/// use std::io::Write;
/// use std::sync::{Arc, Mutex};
/// use jbrest::content::MessageBodyWorkers;
/// use jbrest::header::MediaType;
/// use jbrest::message::outbound::OutboundMessageContext;
/// use jbrest::message::MapPropertiesDelegate;
///
/// let sent = Arc::new(Mutex::new(None));
/// let length = sent.clone();
/// let mut ctx = OutboundMessageContext::default()
///     .with_workers(Arc::new(MessageBodyWorkers::with_builtins()));
/// ctx.enable_buffering().unwrap();
/// ctx.set_stream_provider(move |content_length: Option<usize>| -> std::io::Result<Box<dyn Write + Send>> {
///     *length.lock().unwrap() = content_length;
///     Ok(Box::new(std::io::sink()))
/// });
/// ctx.set_media_type(MediaType::text_plain());
/// ctx.set_entity("Hello".to_string());
/// ctx.write_entity(&mut MapPropertiesDelegate::new()).unwrap();
/// ctx.close();
/// assert_eq!(*sent.lock().unwrap(), Some(5));
/// ```
pub struct OutboundMessageContext {
    headers: HeaderMap<HeaderValue>,
    entity: Option<Arc<Mutex<Entity>>>,
    entity_type: Option<EntityType>,
    committing: CommittingWriter,
    entity_stream: Box<dyn Write + Send>,
    workers: Option<Arc<MessageBodyWorkers>>,
    interceptors: Vec<Arc<dyn WriterInterceptor>>,
    configuration: Configuration,
    media_type: OnceCell<Option<MediaType>>,
    closed: bool,
}

impl Default for OutboundMessageContext {
    fn default() -> Self {
        Self::new(Configuration::default())
    }
}

impl OutboundMessageContext {
    pub fn new(configuration: Configuration) -> Self {
        let mut headers = HeaderMap::new();
        headers.set_guard(header::CONTENT_TYPE);
        let committing = CommittingWriter::default();
        Self {
            headers,
            entity: None,
            entity_type: None,
            entity_stream: Box::new(committing.clone()),
            committing,
            workers: None,
            interceptors: vec![],
            configuration,
            media_type: OnceCell::new(),
            closed: false,
        }
    }

    /// Copy headers, entity and settings of `original`. The copy gets its
    /// own entity stream and shares the entity with `original`.
    pub fn from_context(original: &OutboundMessageContext) -> Self {
        let mut ctx = Self::new(original.configuration.clone());
        ctx.headers = original.headers.clone();
        ctx.entity = original.entity.clone();
        ctx.entity_type = original.entity_type;
        ctx.workers = original.workers.clone();
        ctx.interceptors = original.interceptors.clone();
        ctx
    }

    pub fn with_workers(mut self, workers: Arc<MessageBodyWorkers>) -> Self {
        self.workers = Some(workers);
        self
    }
    pub fn with_writer_interceptors(mut self, interceptors: Vec<Arc<dyn WriterInterceptor>>) -> Self {
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
    pub fn writer_interceptors(&self) -> &[Arc<dyn WriterInterceptor>] {
        &self.interceptors
    }

    /// Add a header value.
    pub fn header<V: Into<HeaderValue>>(&mut self, name: &str, value: V) -> &mut Self {
        self.headers.add(name, value.into());
        self
    }
    pub fn headers(&self) -> &HeaderMap<HeaderValue> {
        &self.headers
    }
    pub fn headers_mut(&mut self) -> &mut HeaderMap<HeaderValue> {
        &mut self.headers
    }
    /// Headers in their string form.
    pub fn string_headers(&self) -> HeaderMap<String> {
        self.headers.map_values(|value| value.to_string())
    }
    /// Drop every header and take those of `headers` instead.
    pub fn replace_headers(&mut self, headers: &HeaderMap<HeaderValue>) {
        self.headers.clear();
        for (name, values) in headers.iter() {
            self.headers.put(name.as_str(), values.to_vec());
        }
    }

    fn header_error(&self, name: &str, value: &str, e: HeaderParseError) -> MessageError {
        MessageError::header_value(name, value, Direction::Outbound, e)
    }

    /// `Content-Type`, `None` when absent.
    pub fn media_type(&mut self) -> Result<Option<MediaType>> {
        if self.headers.is_observed_and_reset(header::CONTENT_TYPE) {
            self.media_type.take();
        }
        let headers = &self.headers;
        self.media_type
            .get_or_try_init(|| {
                single_typed(headers, header::CONTENT_TYPE, |value| {
                    value.as_media_type().cloned()
                })
            })
            .map(Option::clone)
    }
    pub fn set_media_type(&mut self, media_type: MediaType) {
        self.headers
            .put_single(header::CONTENT_TYPE, HeaderValue::MediaType(media_type));
    }

    /// `Accept` media types in header order. Missing or empty means `*/*`.
    /// String values are replaced in the map by their parsed form.
    pub fn acceptable_media_types(&mut self) -> Result<Vec<AcceptableMediaType>> {
        let values = match self.headers.get(header::ACCEPT) {
            Some(values) if !values.is_empty() => values.to_vec(),
            _ => return Ok(vec![AcceptableMediaType::from(MediaType::wildcard())]),
        };
        let mut converted = false;
        let mut result = Vec::with_capacity(values.len());
        for value in values {
            match value {
                HeaderValue::AcceptableMediaType(accepted) => result.push(accepted),
                HeaderValue::MediaType(media_type) => {
                    result.push(AcceptableMediaType::from(media_type));
                    converted = true;
                }
                other => {
                    let text = other.to_string();
                    let parsed = read_accept_media_type(&text).map_err(|e| {
                        let e = HeaderParseError::from_parse(header::ACCEPT, &text, &e);
                        self.header_error(header::ACCEPT, &text, e)
                    })?;
                    result.extend(parsed);
                    converted = true;
                }
            }
        }
        if converted {
            self.headers.put(
                header::ACCEPT,
                result
                    .iter()
                    .cloned()
                    .map(HeaderValue::AcceptableMediaType)
                    .collect(),
            );
        }
        Ok(result)
    }

    /// `Accept-Language` in header order. Missing or empty means `*`.
    /// String values are replaced in the map by their parsed form.
    pub fn acceptable_languages(&mut self) -> Result<Vec<AcceptableLanguageTag>> {
        let values = match self.headers.get(header::ACCEPT_LANGUAGE) {
            Some(values) if !values.is_empty() => values.to_vec(),
            _ => return Ok(vec![AcceptableLanguageTag::wildcard()]),
        };
        let mut converted = false;
        let mut result = Vec::with_capacity(values.len());
        for value in values {
            match value {
                HeaderValue::AcceptableLanguage(accepted) => result.push(accepted),
                HeaderValue::Language(tag) => {
                    result.push(AcceptableLanguageTag::new(tag, DEFAULT_QUALITY));
                    converted = true;
                }
                other => {
                    let text = other.to_string();
                    let parsed = read_accept_language(&text).map_err(|e| {
                        let e = HeaderParseError::from_parse(header::ACCEPT_LANGUAGE, &text, &e);
                        self.header_error(header::ACCEPT_LANGUAGE, &text, e)
                    })?;
                    result.extend(parsed);
                    converted = true;
                }
            }
        }
        if converted {
            self.headers.put(
                header::ACCEPT_LANGUAGE,
                result
                    .iter()
                    .cloned()
                    .map(HeaderValue::AcceptableLanguage)
                    .collect(),
            );
        }
        Ok(result)
    }

    pub fn has_entity(&self) -> bool {
        self.entity.is_some()
    }
    /// The entity, locked for the lifetime of the guard.
    pub fn entity(&self) -> Option<MutexGuard<'_, Entity>> {
        self.entity.as_ref().map(|entity| entity.lock())
    }
    pub fn entity_type(&self) -> Option<&EntityType> {
        self.entity_type.as_ref()
    }
    pub fn set_entity<T: Any + Send>(&mut self, entity: T) {
        self.set_boxed_entity(Box::new(entity), EntityType::of::<T>());
    }
    pub fn set_boxed_entity(&mut self, entity: Entity, entity_type: EntityType) {
        self.entity = Some(Arc::new(Mutex::new(entity)));
        self.entity_type = Some(entity_type);
    }
    /// Remove the entity from this context. It is returned unless a copy
    /// made with [`from_context`](Self::from_context) still shares it.
    pub fn take_entity(&mut self) -> Option<Entity> {
        self.entity_type = None;
        let shared = self.entity.take()?;
        Arc::try_unwrap(shared).ok().map(Mutex::into_inner)
    }

    pub fn set_stream_provider<P: StreamProvider + 'static>(&mut self, provider: P) {
        self.committing.lock().set_stream_provider(provider);
    }
    /// Buffer as much of the entity as the configured outbound content
    /// length buffer allows.
    pub fn enable_buffering(&mut self) -> Result<()> {
        let size = self.configuration.outbound_content_length_buffer;
        self.committing.lock().enable_buffering(size)
    }
    /// The stream entities are written to.
    pub fn entity_stream(&mut self) -> &mut (dyn Write + Send) {
        self.entity_stream.as_mut()
    }
    /// Replace the entity stream, typically with a wrapper around
    /// [`committing_stream`](Self::committing_stream).
    pub fn set_entity_stream(&mut self, stream: Box<dyn Write + Send>) {
        self.entity_stream = stream;
    }
    pub fn committing_stream(&self) -> CommittingWriter {
        self.committing.clone()
    }

    pub fn is_committed(&self) -> bool {
        self.committing.lock().is_committed()
    }
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(MessageError::IllegalState(CLOSED.to_string()));
        }
        Ok(())
    }

    /// Flush the entity stream and commit if that did not.
    pub fn commit_stream(&mut self) -> Result<()> {
        self.ensure_open()?;
        if !self.is_committed() {
            self.entity_stream.flush()?;
            let mut committing = self.committing.lock();
            if !committing.is_committed() {
                committing.commit()?;
                committing.flush()?;
            }
        }
        Ok(())
    }

    /// Write the entity through the writer interceptors and the body
    /// writer for its type and media type. Without `Content-Type` the
    /// negotiated media type is used and set on the message.
    pub fn write_entity(&mut self, properties: &mut dyn PropertiesDelegate) -> Result<()> {
        self.ensure_open()?;
        let (shared, entity_type) = match (self.entity.clone(), self.entity_type) {
            (Some(shared), Some(entity_type)) => (shared, entity_type),
            _ => return Ok(()),
        };
        let workers = match self.workers.clone() {
            Some(workers) => workers,
            None => {
                return Err(MessageError::WriterNotFound {
                    entity_type,
                    media_type: self.media_type()?.unwrap_or_else(MediaType::wildcard),
                })
            }
        };
        let media_type = match self.media_type()? {
            Some(media_type) => media_type,
            None => {
                let accept = [AcceptableMediaType::from(MediaType::wildcard())];
                let media_type = workers
                    .negotiate(&entity_type, &accept)
                    .unwrap_or_else(MediaType::application_octet_stream);
                self.set_media_type(media_type.clone());
                media_type
            }
        };
        let mut entity = shared.lock();
        let written = WriterInterceptorContext::new(
            &self.interceptors,
            &workers,
            &mut *entity,
            entity_type,
            media_type,
            &mut self.headers,
            properties,
            Box::new(&mut self.entity_stream),
        )
        .with_tracing(self.configuration.tracing)
        .proceed();
        written
    }

    /// Names of headers that differ from `sent`, the headers as they were
    /// when written out by `connector`. Changes are logged as warnings
    /// since they will not reach the peer.
    pub fn check_header_changes(&self, sent: &HeaderMap<String>, connector: &str) -> Vec<String> {
        let current = self.string_headers();
        let mut changed: Vec<String> = vec![];
        for (name, values) in current.iter() {
            if sent.get(name.as_str()) != Some(values) {
                changed.push(name.to_string());
            }
        }
        for name in sent.names() {
            if !current.contains_key(name.as_str()) {
                changed.push(name.to_string());
            }
        }
        if !changed.is_empty() {
            warn!(
                "headers {:?} were modified after {} sent them, the changes are not sent",
                changed, connector
            );
        }
        changed
    }

    /// Flush the entity stream, then close the committing stream,
    /// committing it if nothing was written. Writes to the entity stream
    /// fail afterwards. Failures are logged. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.has_entity() {
            if let Err(e) = self.entity_stream.flush() {
                debug!("flushing entity stream failed: {}", e);
            }
        }
        let mut committing = self.committing.lock();
        if !committing.is_closed() {
            if let Err(e) = committing.close() {
                debug!("closing committing output stream failed: {}", e);
            }
        }
    }
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// The single value of `name`, taken as is when already typed and parsed
/// from its string form otherwise.
fn single_typed<T, F>(headers: &HeaderMap<HeaderValue>, name: &str, typed: F) -> Result<Option<T>>
where
    T: FromStr<Err = HeaderParseError>,
    F: Fn(&HeaderValue) -> Option<T>,
{
    match headers.get(name) {
        None | Some([]) => Ok(None),
        Some([value]) => match typed(value) {
            Some(value) => Ok(Some(value)),
            None => {
                let text = value.to_string();
                text.parse()
                    .map(Some)
                    .map_err(|e| MessageError::header_value(name, &text, Direction::Outbound, e))
            }
        },
        Some(values) => Err(MessageError::TooManyHeaderValues {
            name: name.to_string(),
            values: values
                .iter()
                .map(|value| value.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

impl HeaderMethods for OutboundMessageContext {
    fn header_values(&self, name: &str) -> Option<Vec<String>> {
        self.headers
            .get(name)
            .map(|values| values.iter().map(|value| value.to_string()).collect())
    }
    fn direction(&self) -> Direction {
        Direction::Outbound
    }
    fn date(&self) -> Result<Option<std::time::SystemTime>> {
        match self.headers.get(header::DATE) {
            Some([value]) if value.as_date().is_some() => Ok(value.as_date()),
            _ => self.single_header_as(header::DATE, header::read_date),
        }
    }
    fn entity_tag(&self) -> Result<Option<header::EntityTag>> {
        single_typed(&self.headers, header::ETAG, |value| value.as_entity_tag().cloned())
    }
}

impl fmt::Debug for OutboundMessageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundMessageContext")
            .field("headers", &self.headers)
            .field("entity_type", &self.entity_type)
            .field("committing", &self.committing)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io;
    use crate::header::{EntityTag, LanguageTag};
    use crate::message::MapPropertiesDelegate;

    #[derive(Clone, Default)]
    struct Sent {
        bytes: Arc<Mutex<Vec<u8>>>,
        lengths: Arc<Mutex<Vec<Option<usize>>>>,
    }

    impl Write for Sent {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.bytes.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn context(config: Configuration) -> (OutboundMessageContext, Sent) {
        let sent = Sent::default();
        let mut ctx = OutboundMessageContext::new(config)
            .with_workers(Arc::new(MessageBodyWorkers::with_builtins()));
        ctx.enable_buffering().unwrap();
        let provider_sent = sent.clone();
        ctx.set_stream_provider(
            move |length: Option<usize>| -> io::Result<Box<dyn Write + Send>> {
                provider_sent.lengths.lock().push(length);
                Ok(Box::new(provider_sent.clone()))
            },
        );
        (ctx, sent)
    }

    #[test]
    fn test_media_type_cache() {
        let mut ctx = OutboundMessageContext::default();
        assert_eq!(ctx.media_type().unwrap(), None);
        ctx.header("Content-Type", "text/html");
        assert_eq!(ctx.media_type().unwrap(), Some(MediaType::text_html()));
        ctx.set_media_type(MediaType::application_json());
        assert_eq!(ctx.media_type().unwrap(), Some(MediaType::application_json()));
        ctx.header("content-type", "text/plain");
        assert!(matches!(
            ctx.media_type(),
            Err(MessageError::TooManyHeaderValues { .. })
        ));
        ctx.headers_mut().put_single("Content-Type", HeaderValue::text("no slash"));
        assert!(matches!(
            ctx.media_type(),
            Err(MessageError::HeaderValue {
                direction: Direction::Outbound,
                ..
            })
        ));
    }

    #[test]
    fn test_acceptable_media_types_written_back() {
        let mut ctx = OutboundMessageContext::default();
        assert_eq!(
            ctx.acceptable_media_types().unwrap(),
            vec![AcceptableMediaType::from(MediaType::wildcard())]
        );
        ctx.header("Accept", "text/html;q=0.5, application/json");
        ctx.header("Accept", MediaType::text_plain());
        let accepted = ctx.acceptable_media_types().unwrap();
        assert_eq!(accepted.len(), 3);
        assert_eq!(accepted[2].media_type(), &MediaType::text_plain());
        let values = ctx.headers().get("accept").unwrap();
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|v| v.as_acceptable_media_type().is_some()));

        ctx.headers_mut().put_single("Accept", HeaderValue::text("text/"));
        assert!(ctx.acceptable_media_types().is_err());
    }

    #[test]
    fn test_acceptable_languages() {
        let mut ctx = OutboundMessageContext::default();
        assert_eq!(
            ctx.acceptable_languages().unwrap(),
            vec![AcceptableLanguageTag::wildcard()]
        );
        ctx.header("Accept-Language", LanguageTag::new("fr", Some("CA")));
        ctx.header("Accept-Language", "en;q=0.3");
        let accepted = ctx.acceptable_languages().unwrap();
        assert_eq!(accepted[0].tag(), &LanguageTag::new("fr", Some("CA")));
        assert_eq!(accepted[1].tag(), &LanguageTag::new("en", None));
        assert!(ctx.headers().get("Accept-Language").unwrap()[1]
            .as_acceptable_language()
            .is_some());
    }

    #[test]
    fn test_typed_header_methods() {
        let mut ctx = OutboundMessageContext::default();
        let tag = EntityTag::weak("v1");
        ctx.header("ETag", tag.clone());
        ctx.header("Content-Length", 12usize);
        assert_eq!(ctx.entity_tag().unwrap(), Some(tag));
        assert_eq!(ctx.length().unwrap(), Some(12));
        assert_eq!(
            ctx.string_headers().first("etag"),
            Some(&"W/\"v1\"".to_string())
        );
    }

    #[test]
    fn test_replace_headers_and_copy() {
        let mut ctx = OutboundMessageContext::default();
        ctx.header("X-A", "1");
        ctx.set_entity(7u32);
        let mut replacement = HeaderMap::new();
        replacement.add("X-B", HeaderValue::text("2"));
        ctx.replace_headers(&replacement);
        assert!(!ctx.headers().contains_key("X-A"));
        assert_eq!(ctx.header_string("x-b"), Some("2".to_string()));

        let mut copy = OutboundMessageContext::from_context(&ctx);
        assert_eq!(copy.header_string("X-B"), Some("2".to_string()));
        assert!(copy.entity_type().unwrap().is::<u32>());
        assert_eq!(copy.entity().unwrap().downcast_ref::<u32>(), Some(&7));
        assert!(copy.take_entity().is_none());
        assert!(!copy.has_entity());
        let entity = ctx.take_entity().unwrap();
        assert_eq!(entity.downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn test_write_small_entity_with_length() {
        let (mut ctx, sent) = context(Configuration::default());
        ctx.set_entity("Hello".to_string());
        ctx.write_entity(&mut MapPropertiesDelegate::new()).unwrap();
        assert_eq!(
            ctx.media_type().unwrap(),
            Some(MediaType::application_octet_stream())
        );
        assert!(!ctx.is_committed());
        ctx.close();
        ctx.close();
        assert!(ctx.is_committed());
        assert_eq!(*sent.lengths.lock(), vec![Some(5)]);
        assert_eq!(*sent.bytes.lock(), b"Hello".to_vec());
    }

    #[test]
    fn test_write_large_entity_without_length() {
        let config = Configuration::default().with_outbound_content_length_buffer(2);
        let (mut ctx, sent) = context(config);
        ctx.set_media_type(MediaType::text_plain());
        ctx.set_entity(123456u32);
        ctx.write_entity(&mut MapPropertiesDelegate::new()).unwrap();
        assert!(ctx.is_committed());
        ctx.close();
        assert_eq!(*sent.lengths.lock(), vec![None]);
        assert_eq!(*sent.bytes.lock(), b"123456".to_vec());
    }

    #[test]
    fn test_commit_without_entity() {
        let (mut ctx, sent) = context(Configuration::default());
        ctx.write_entity(&mut MapPropertiesDelegate::new()).unwrap();
        ctx.commit_stream().unwrap();
        assert!(ctx.is_committed());
        assert_eq!(*sent.lengths.lock(), vec![Some(0)]);
    }

    #[test]
    fn test_writer_not_found() {
        let (mut ctx, _) = context(Configuration::default());
        ctx.set_media_type(MediaType::application_json());
        ctx.set_entity(1u8);
        assert!(matches!(
            ctx.write_entity(&mut MapPropertiesDelegate::new()),
            Err(MessageError::WriterNotFound { .. })
        ));
    }

    #[test]
    fn test_check_header_changes() {
        let mut ctx = OutboundMessageContext::default();
        ctx.header("X-A", "1");
        let sent = ctx.string_headers();
        assert!(ctx.check_header_changes(&sent, "test").is_empty());
        ctx.header("X-A", "2");
        ctx.header("X-B", "3");
        assert_eq!(ctx.check_header_changes(&sent, "test"), vec!["X-A", "X-B"]);
    }

    #[test]
    fn test_write_after_close() {
        let (mut ctx, sent) = context(Configuration::default());
        ctx.set_entity("first".to_string());
        ctx.write_entity(&mut MapPropertiesDelegate::new()).unwrap();
        ctx.close();
        assert!(ctx.is_closed());

        ctx.set_entity("second".to_string());
        match ctx.write_entity(&mut MapPropertiesDelegate::new()) {
            Err(MessageError::IllegalState(msg)) => assert_eq!(msg, CLOSED),
            other => panic!("expected illegal state, got {:?}", other),
        }
        assert!(matches!(
            ctx.commit_stream(),
            Err(MessageError::IllegalState(_))
        ));
        assert!(ctx.entity_stream().write_all(b"raw").is_err());
        assert_eq!(*sent.bytes.lock(), b"first".to_vec());
        assert_eq!(*sent.lengths.lock(), vec![Some(5)]);
    }

    #[test]
    fn test_write_after_close_without_entity() {
        let (mut ctx, sent) = context(Configuration::default());
        ctx.close();
        assert!(matches!(
            ctx.write_entity(&mut MapPropertiesDelegate::new()),
            Err(MessageError::IllegalState(_))
        ));
        assert!(ctx.entity_stream().write_all(b"raw").is_err());
        assert_eq!(*sent.lengths.lock(), vec![Some(0)]);
        assert!(sent.bytes.lock().is_empty());
    }

    #[test]
    fn test_double_close_commits_once() {
        let (mut ctx, sent) = context(Configuration::default());
        ctx.set_entity("once".to_string());
        ctx.write_entity(&mut MapPropertiesDelegate::new()).unwrap();
        ctx.close();
        ctx.close();
        assert!(ctx.is_committed());
        assert_eq!(*sent.lengths.lock(), vec![Some(4)]);
        assert_eq!(*sent.bytes.lock(), b"once".to_vec());
    }
}
