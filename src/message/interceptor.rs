//! Reader and writer interceptor chains.
//!
//! An interceptor wraps entity (de)serialization: it may change the entity
//! type, media type, headers, properties or stream, then call
//! [`proceed`](ReaderInterceptorContext::proceed) to run the rest of the
//! chain. The body reader or writer runs after the last interceptor. Not
//! calling `proceed` cuts the chain short.
//!
//! ```
//! use std::sync::Arc;
//! use jbrest::content::MessageBodyWorkers;
//! use jbrest::header::{HeaderMap, MediaType};
//! use jbrest::io::EntityInputStream;
//! use jbrest::message::interceptor::{ReaderInterceptor, ReaderInterceptorContext};
//! use jbrest::message::{EntityType, MapPropertiesDelegate};
//!
//! let count_reads = |ctx: &mut ReaderInterceptorContext<'_>| {
//!     ctx.properties_mut().set_property("counted", "yes");
//!     ctx.proceed()
//! };
//! let interceptors: Vec<Arc<dyn ReaderInterceptor>> = vec![Arc::new(count_reads)];
//! let workers = MessageBodyWorkers::with_builtins();
//! let mut headers = HeaderMap::new();
//! let mut properties = MapPropertiesDelegate::new();
//! let mut input = EntityInputStream::new(&b"hi"[..]);
//! let entity = ReaderInterceptorContext::new(
//!     &interceptors,
//!     &workers,
//!     EntityType::of::<String>(),
//!     MediaType::text_plain(),
//!     &mut headers,
//!     &mut properties,
//!     &mut input,
//! )
//! .proceed()
//! .unwrap()
//! .unwrap();
//! assert_eq!(*entity.downcast::<String>().unwrap(), "hi");
//! ```
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use log::trace;

use crate::content::MessageBodyWorkers;
use crate::header::{self, HeaderMap, HeaderValue, MediaType};
use crate::io::EntityInputStream;
use crate::message::{Entity, EntityType, MessageError, PropertiesDelegate, Result};

pub trait ReaderInterceptor: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
    fn around_read_from(&self, context: &mut ReaderInterceptorContext<'_>)
        -> Result<Option<Entity>>;
}

impl<F> ReaderInterceptor for F
where
    F: Fn(&mut ReaderInterceptorContext<'_>) -> Result<Option<Entity>> + Send + Sync,
{
    fn around_read_from(
        &self,
        context: &mut ReaderInterceptorContext<'_>,
    ) -> Result<Option<Entity>> {
        self(context)
    }
}

pub trait WriterInterceptor: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
    fn around_write_to(&self, context: &mut WriterInterceptorContext<'_>) -> Result<()>;
}

impl<F> WriterInterceptor for F
where
    F: Fn(&mut WriterInterceptorContext<'_>) -> Result<()> + Send + Sync,
{
    fn around_write_to(&self, context: &mut WriterInterceptorContext<'_>) -> Result<()> {
        self(context)
    }
}

fn past_end(chain: &str) -> MessageError {
    MessageError::processing(&format!(
        "proceed() called after the end of the {} interceptor chain",
        chain
    ))
}

/// Walks a reader interceptor chain and ends in the body reader selected for
/// the current entity type and media type.
pub struct ReaderInterceptorContext<'a> {
    interceptors: &'a [Arc<dyn ReaderInterceptor>],
    position: usize,
    workers: &'a MessageBodyWorkers,
    entity_type: EntityType,
    media_type: MediaType,
    headers: &'a mut HeaderMap<String>,
    properties: &'a mut dyn PropertiesDelegate,
    input: &'a mut EntityInputStream,
    translate_no_content: bool,
    tracing: bool,
    processed: usize,
}

impl<'a> ReaderInterceptorContext<'a> {
    pub fn new(
        interceptors: &'a [Arc<dyn ReaderInterceptor>],
        workers: &'a MessageBodyWorkers,
        entity_type: EntityType,
        media_type: MediaType,
        headers: &'a mut HeaderMap<String>,
        properties: &'a mut dyn PropertiesDelegate,
        input: &'a mut EntityInputStream,
    ) -> Self {
        Self {
            interceptors,
            position: 0,
            workers,
            entity_type,
            media_type,
            headers,
            properties,
            input,
            translate_no_content: false,
            tracing: false,
            processed: 0,
        }
    }
    /// Report reader [`NoContent`](MessageError::NoContent) failures as bad
    /// requests.
    pub fn with_translate_no_content(mut self, translate: bool) -> Self {
        self.translate_no_content = translate;
        self
    }
    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.tracing = tracing;
        self
    }

    /// Run the next interceptor, or the body reader after the last one.
    pub fn proceed(&mut self) -> Result<Option<Entity>> {
        let interceptors = self.interceptors;
        let position = self.position;
        self.position += 1;
        if position < interceptors.len() {
            let interceptor = &interceptors[position];
            self.processed += 1;
            if !self.tracing {
                return interceptor.around_read_from(self);
            }
            let start = Instant::now();
            trace!("reader interceptor {} started", interceptor.name());
            let result = interceptor.around_read_from(self);
            trace!(
                "reader interceptor {} finished in {:?}",
                interceptor.name(),
                start.elapsed()
            );
            result
        } else if position == interceptors.len() {
            if !self.tracing {
                return self.read_entity();
            }
            let start = Instant::now();
            let result = self.read_entity();
            trace!(
                "read {} as {} in {:?}",
                self.entity_type,
                self.media_type,
                start.elapsed()
            );
            result
        } else {
            Err(past_end("reader"))
        }
    }

    fn read_entity(&mut self) -> Result<Option<Entity>> {
        let reader = match self.workers.reader_for(&self.entity_type, &self.media_type) {
            Some(reader) => reader,
            None => {
                if !self.headers.contains_key(header::CONTENT_TYPE) && self.input.is_empty()? {
                    return Ok(None);
                }
                return Err(MessageError::ReaderNotFound {
                    entity_type: self.entity_type,
                    media_type: self.media_type.clone(),
                });
            }
        };
        match reader.read_from(
            &self.entity_type,
            &self.media_type,
            &*self.headers,
            &mut *self.input,
        ) {
            Ok(entity) => Ok(Some(entity)),
            Err(e @ MessageError::NoContent(_)) if self.translate_no_content => {
                Err(MessageError::BadRequest(Box::new(e)))
            }
            Err(e) => Err(e),
        }
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }
    pub fn set_entity_type(&mut self, entity_type: EntityType) {
        self.entity_type = entity_type;
    }
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }
    pub fn set_media_type(&mut self, media_type: MediaType) {
        self.media_type = media_type;
    }
    pub fn headers(&self) -> &HeaderMap<String> {
        &*self.headers
    }
    pub fn headers_mut(&mut self) -> &mut HeaderMap<String> {
        &mut *self.headers
    }
    pub fn properties(&self) -> &dyn PropertiesDelegate {
        &*self.properties
    }
    pub fn properties_mut(&mut self) -> &mut dyn PropertiesDelegate {
        &mut *self.properties
    }
    pub fn input_stream(&mut self) -> &mut EntityInputStream {
        &mut *self.input
    }
    /// Replace the entity stream seen by the rest of the chain.
    pub fn set_input_stream(&mut self, input: EntityInputStream) {
        *self.input = input;
    }
    /// Interceptors invoked so far.
    pub fn processed_count(&self) -> usize {
        self.processed
    }
}

/// Walks a writer interceptor chain and ends in the body writer selected for
/// the current entity type and media type.
pub struct WriterInterceptorContext<'a> {
    interceptors: &'a [Arc<dyn WriterInterceptor>],
    position: usize,
    workers: &'a MessageBodyWorkers,
    entity: &'a mut Entity,
    entity_type: EntityType,
    media_type: MediaType,
    headers: &'a mut HeaderMap<HeaderValue>,
    properties: &'a mut dyn PropertiesDelegate,
    output: Box<dyn Write + 'a>,
    tracing: bool,
    processed: usize,
}

impl<'a> WriterInterceptorContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        interceptors: &'a [Arc<dyn WriterInterceptor>],
        workers: &'a MessageBodyWorkers,
        entity: &'a mut Entity,
        entity_type: EntityType,
        media_type: MediaType,
        headers: &'a mut HeaderMap<HeaderValue>,
        properties: &'a mut dyn PropertiesDelegate,
        output: Box<dyn Write + 'a>,
    ) -> Self {
        Self {
            interceptors,
            position: 0,
            workers,
            entity,
            entity_type,
            media_type,
            headers,
            properties,
            output,
            tracing: false,
            processed: 0,
        }
    }
    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.tracing = tracing;
        self
    }

    /// Run the next interceptor, or the body writer after the last one.
    pub fn proceed(&mut self) -> Result<()> {
        let interceptors = self.interceptors;
        let position = self.position;
        self.position += 1;
        if position < interceptors.len() {
            let interceptor = &interceptors[position];
            self.processed += 1;
            if !self.tracing {
                return interceptor.around_write_to(self);
            }
            let start = Instant::now();
            trace!("writer interceptor {} started", interceptor.name());
            let result = interceptor.around_write_to(self);
            trace!(
                "writer interceptor {} finished in {:?}",
                interceptor.name(),
                start.elapsed()
            );
            result
        } else if position == interceptors.len() {
            if !self.tracing {
                return self.write_entity();
            }
            let start = Instant::now();
            let result = self.write_entity();
            trace!(
                "wrote {} as {} in {:?}",
                self.entity_type,
                self.media_type,
                start.elapsed()
            );
            result
        } else {
            Err(past_end("writer"))
        }
    }

    fn write_entity(&mut self) -> Result<()> {
        let writer = self
            .workers
            .writer_for(&self.entity_type, &self.media_type)
            .ok_or_else(|| MessageError::WriterNotFound {
                entity_type: self.entity_type,
                media_type: self.media_type.clone(),
            })?;
        writer.write_to(
            &mut **self.entity,
            &self.entity_type,
            &self.media_type,
            &mut *self.headers,
            &mut *self.output,
        )?;
        self.output.flush()?;
        Ok(())
    }

    pub fn entity(&self) -> &Entity {
        &*self.entity
    }
    /// Replace the entity; `entity_type` must describe the new value.
    pub fn set_entity(&mut self, entity: Entity, entity_type: EntityType) {
        *self.entity = entity;
        self.entity_type = entity_type;
    }
    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }
    pub fn set_media_type(&mut self, media_type: MediaType) {
        self.media_type = media_type;
    }
    pub fn headers(&self) -> &HeaderMap<HeaderValue> {
        &*self.headers
    }
    pub fn headers_mut(&mut self) -> &mut HeaderMap<HeaderValue> {
        &mut *self.headers
    }
    pub fn properties(&self) -> &dyn PropertiesDelegate {
        &*self.properties
    }
    pub fn properties_mut(&mut self) -> &mut dyn PropertiesDelegate {
        &mut *self.properties
    }
    pub fn output_stream(&mut self) -> &mut (dyn Write + 'a) {
        &mut *self.output
    }
    /// Take the output stream out, e.g. to wrap it, leaving a sink behind.
    pub fn take_output_stream(&mut self) -> Box<dyn Write + 'a> {
        std::mem::replace(&mut self.output, Box::new(io::sink()))
    }
    pub fn set_output_stream(&mut self, output: Box<dyn Write + 'a>) {
        self.output = output;
    }
    /// Interceptors invoked so far.
    pub fn processed_count(&self) -> usize {
        self.processed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::MapPropertiesDelegate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn read_with(
        interceptors: &[Arc<dyn ReaderInterceptor>],
        entity_type: EntityType,
        headers: &mut HeaderMap<String>,
        input: &'static [u8],
    ) -> (Result<Option<Entity>>, usize) {
        let workers = MessageBodyWorkers::with_builtins();
        let mut properties = MapPropertiesDelegate::new();
        let mut input = EntityInputStream::new(input);
        let mut ctx = ReaderInterceptorContext::new(
            interceptors,
            &workers,
            entity_type,
            MediaType::text_plain(),
            headers,
            &mut properties,
            &mut input,
        )
        .with_translate_no_content(true)
        .with_tracing(true);
        let result = ctx.proceed();
        (result, ctx.processed_count())
    }

    struct Order(Arc<AtomicUsize>, usize);

    impl ReaderInterceptor for Order {
        fn around_read_from(
            &self,
            context: &mut ReaderInterceptorContext<'_>,
        ) -> Result<Option<Entity>> {
            assert_eq!(self.0.fetch_add(1, Ordering::SeqCst), self.1);
            context.proceed()
        }
    }

    #[test]
    fn test_reader_chain_order() {
        let _ = stderrlog::new().module(module_path!()).verbosity(4).init();
        let counter = Arc::new(AtomicUsize::new(0));
        let interceptors: Vec<Arc<dyn ReaderInterceptor>> = vec![
            Arc::new(Order(counter.clone(), 0)),
            Arc::new(Order(counter.clone(), 1)),
        ];
        let (result, processed) = read_with(
            &interceptors,
            EntityType::of::<String>(),
            &mut HeaderMap::new(),
            b"body",
        );
        let entity = result.unwrap().unwrap();
        assert_eq!(*entity.downcast::<String>().unwrap(), "body");
        assert_eq!(processed, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reader_short_circuit_and_replace_stream() {
        let short = |_: &mut ReaderInterceptorContext<'_>| -> Result<Option<Entity>> {
            Ok(Some(Box::new("cached".to_string())))
        };
        let never = |_: &mut ReaderInterceptorContext<'_>| -> Result<Option<Entity>> {
            panic!("chain should have stopped")
        };
        let interceptors: Vec<Arc<dyn ReaderInterceptor>> = vec![Arc::new(short), Arc::new(never)];
        let (result, processed) =
            read_with(&interceptors, EntityType::of::<String>(), &mut HeaderMap::new(), b"x");
        assert_eq!(*result.unwrap().unwrap().downcast::<String>().unwrap(), "cached");
        assert_eq!(processed, 1);

        let replace = |ctx: &mut ReaderInterceptorContext<'_>| {
            ctx.set_input_stream(EntityInputStream::new(&b"42"[..]));
            ctx.set_entity_type(EntityType::of::<u32>());
            ctx.proceed()
        };
        let interceptors: Vec<Arc<dyn ReaderInterceptor>> = vec![Arc::new(replace)];
        let (result, _) =
            read_with(&interceptors, EntityType::of::<String>(), &mut HeaderMap::new(), b"x");
        assert_eq!(*result.unwrap().unwrap().downcast::<u32>().unwrap(), 42);
    }

    #[test]
    fn test_proceed_past_end() {
        let twice = |ctx: &mut ReaderInterceptorContext<'_>| {
            ctx.proceed()?;
            ctx.proceed()
        };
        let interceptors: Vec<Arc<dyn ReaderInterceptor>> = vec![Arc::new(twice)];
        let (result, _) =
            read_with(&interceptors, EntityType::of::<String>(), &mut HeaderMap::new(), b"x");
        match result {
            Err(MessageError::Processing { .. }) => {}
            _ => panic!("expected processing error"),
        }
    }

    #[test]
    fn test_reader_not_found() {
        struct Unknown;
        let (result, _) = read_with(&[], EntityType::of::<Unknown>(), &mut HeaderMap::new(), b"");
        assert!(result.unwrap().is_none());

        let (result, _) = read_with(&[], EntityType::of::<Unknown>(), &mut HeaderMap::new(), b"x");
        match result {
            Err(MessageError::ReaderNotFound { .. }) => {}
            _ => panic!("expected reader not found"),
        }

        let mut headers = HeaderMap::new();
        headers.add(header::CONTENT_TYPE, "text/plain".to_string());
        let (result, _) = read_with(&[], EntityType::of::<Unknown>(), &mut headers, b"");
        assert!(result.is_err());
    }

    #[test]
    fn test_no_content_translated() {
        let (result, _) = read_with(&[], EntityType::of::<i64>(), &mut HeaderMap::new(), b"");
        match result {
            Err(MessageError::BadRequest(cause)) => match *cause {
                MessageError::NoContent(_) => {}
                _ => panic!("expected no content cause"),
            },
            _ => panic!("expected bad request"),
        }
    }

    struct Upper<'a>(Box<dyn Write + 'a>);

    impl<'a> Write for Upper<'a> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.write_all(&buf.to_ascii_uppercase())?;
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            self.0.flush()
        }
    }

    #[test]
    fn test_writer_chain() {
        let upper = |ctx: &mut WriterInterceptorContext<'_>| {
            let output = ctx.take_output_stream();
            ctx.set_output_stream(Box::new(Upper(output)));
            ctx.headers_mut().add("X-Upper", HeaderValue::from("yes"));
            ctx.proceed()
        };
        let interceptors: Vec<Arc<dyn WriterInterceptor>> = vec![Arc::new(upper)];
        let workers = MessageBodyWorkers::with_builtins();
        let mut entity: Entity = Box::new("hello".to_string());
        let mut headers = HeaderMap::new();
        let mut properties = MapPropertiesDelegate::new();
        let mut out = vec![];
        {
            let mut ctx = WriterInterceptorContext::new(
                &interceptors,
                &workers,
                &mut entity,
                EntityType::of::<String>(),
                MediaType::text_plain(),
                &mut headers,
                &mut properties,
                Box::new(&mut out),
            )
            .with_tracing(true);
            ctx.proceed().unwrap();
            assert_eq!(ctx.processed_count(), 1);
        }
        assert_eq!(out, b"HELLO".to_vec());
        assert!(headers.contains_key("x-upper"));
    }

    #[test]
    fn test_writer_not_found() {
        struct Unknown;
        let workers = MessageBodyWorkers::with_builtins();
        let mut entity: Entity = Box::new(Unknown);
        let mut headers = HeaderMap::new();
        let mut properties = MapPropertiesDelegate::new();
        let mut ctx = WriterInterceptorContext::new(
            &[],
            &workers,
            &mut entity,
            EntityType::of::<Unknown>(),
            MediaType::text_plain(),
            &mut headers,
            &mut properties,
            Box::new(io::sink()),
        );
        match ctx.proceed() {
            Err(MessageError::WriterNotFound { .. }) => {}
            _ => panic!("expected writer not found"),
        }
    }
}
