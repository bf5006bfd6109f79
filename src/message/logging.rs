//! Entity logging interceptor.
//!
//! [`LoggingInterceptor`] is both a reader and a writer interceptor. Each
//! message it sees becomes one `log` record: a note line, the headers
//! sorted by name, and, depending on the [`Verbosity`], the entity up to
//! a maximum size. Lines carry the message id, which request and response
//! share through the [`LOGGING_ID_PROPERTY`] property.
//!
//! ```text
//! 1 * reading alloc::string::String as text/plain on thread main
//! 1 > Content-Type: text/plain
//! hello...more...
//! ```
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use log::{Level, Log, Metadata, Record};
use parking_lot::Mutex;

use crate::config::{Configuration, RuntimeType, Verbosity, DEFAULT_LOGGING_MAX_ENTITY_SIZE};
use crate::content::providers::{charset, decode};
use crate::header::{HeaderMap, MediaType};
use crate::io::{chain_buffer, EntityInputStream};
use crate::message::interceptor::{
    ReaderInterceptor, ReaderInterceptorContext, WriterInterceptor, WriterInterceptorContext,
};
use crate::message::{Entity, PropertiesDelegate, Result};

pub const LOGGING_ID_PROPERTY: &str = "jbrest.logging.id";
pub const DEFAULT_TARGET: &str = "jbrest::logging";

const REQUEST_PREFIX: &str = "> ";
const RESPONSE_PREFIX: &str = "< ";
const NOTIFICATION_PREFIX: &str = "* ";
const MORE: &str = "...more...";

lazy_static! {
    static ref READABLE_MEDIA_TYPES: Vec<MediaType> = vec![
        MediaType::new("text", "*"),
        MediaType::new("application", "vnd.api+json"),
        MediaType::application_atom_xml(),
        MediaType::application_form_urlencoded(),
        MediaType::application_json(),
        MediaType::application_svg_xml(),
        MediaType::application_xhtml_xml(),
        MediaType::application_xml(),
    ];
}

/// Textual media types, whose entities `PayloadText` logs.
pub fn is_readable(media_type: &MediaType) -> bool {
    READABLE_MEDIA_TYPES
        .iter()
        .any(|readable| readable.is_compatible(media_type))
}

pub struct LoggingInterceptor {
    runtime: RuntimeType,
    level: Level,
    verbosity: Verbosity,
    max_entity_size: usize,
    target: String,
    logger: Option<Arc<dyn Log>>,
    next_id: AtomicU64,
}

impl LoggingInterceptor {
    /// Log at debug level to the global logger.
    pub fn new(runtime: RuntimeType) -> Self {
        Self {
            runtime,
            level: Level::Debug,
            verbosity: Verbosity::default(),
            max_entity_size: DEFAULT_LOGGING_MAX_ENTITY_SIZE,
            target: DEFAULT_TARGET.to_string(),
            logger: None,
            next_id: AtomicU64::new(0),
        }
    }
    pub fn from_configuration(config: &Configuration) -> Self {
        Self::new(config.runtime)
            .with_verbosity(config.logging_verbosity)
            .with_max_entity_size(config.logging_max_entity_size)
    }
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }
    pub fn with_max_entity_size(mut self, size: usize) -> Self {
        self.max_entity_size = size;
        self
    }
    pub fn with_target(mut self, target: &str) -> Self {
        self.target = target.to_string();
        self
    }
    /// Send records to `logger` instead of the global logger.
    pub fn with_logger(mut self, logger: Arc<dyn Log>) -> Self {
        self.logger = Some(logger);
        self
    }

    fn logger(&self) -> &dyn Log {
        match &self.logger {
            Some(logger) => logger.as_ref(),
            None => log::logger(),
        }
    }
    fn enabled(&self) -> bool {
        if self.logger.is_none() && self.level > log::max_level() {
            return false;
        }
        let metadata = Metadata::builder()
            .level(self.level)
            .target(&self.target)
            .build();
        self.logger().enabled(&metadata)
    }
    fn log(&self, message: &str) {
        self.logger().log(
            &Record::builder()
                .level(self.level)
                .target(&self.target)
                .module_path(Some(module_path!()))
                .args(format_args!("{}", message))
                .build(),
        );
    }

    fn prints_entity(&self, media_type: &MediaType) -> bool {
        match self.verbosity {
            Verbosity::HeadersOnly => false,
            Verbosity::PayloadText => is_readable(media_type),
            Verbosity::PayloadAny => true,
        }
    }

    /// Reuse the id of the exchange, or number a new one.
    fn id(&self, properties: &mut dyn PropertiesDelegate) -> u64 {
        if let Some(id) = properties
            .property(LOGGING_ID_PROPERTY)
            .and_then(|id| id.parse().ok())
        {
            return id;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        properties.set_property(LOGGING_ID_PROPERTY, &id.to_string());
        id
    }

    /// Requests come in on servers and go out on clients.
    fn prefix(&self, inbound: bool) -> &'static str {
        match (self.runtime, inbound) {
            (RuntimeType::Server, true) | (RuntimeType::Client, false) => REQUEST_PREFIX,
            _ => RESPONSE_PREFIX,
        }
    }

    fn head<V: fmt::Display>(
        &self,
        id: u64,
        note: &str,
        prefix: &str,
        headers: &HeaderMap<V>,
    ) -> String {
        let thread = std::thread::current();
        let mut record = format!(
            "{} {}{} on thread {}\n",
            id,
            NOTIFICATION_PREFIX,
            note,
            thread.name().unwrap_or("unnamed")
        );
        let mut lines: Vec<(&str, String)> = headers
            .iter()
            .map(|(name, values)| {
                let values: Vec<String> = values.iter().map(|value| value.to_string()).collect();
                (name.as_str(), values.join(","))
            })
            .collect();
        lines.sort_by_key(|(name, _)| name.to_ascii_lowercase());
        for (name, value) in lines {
            record.push_str(&format!("{} {}{}: {}\n", id, prefix, name, value));
        }
        record
    }

    /// At most `max_entity_size` bytes of `bytes`, decoded with the
    /// charset of `media_type`.
    fn entity_text(&self, bytes: &[u8], media_type: &MediaType) -> String {
        let shown = &bytes[..bytes.len().min(self.max_entity_size)];
        let mut text = decode(shown.to_vec(), &charset(media_type))
            .unwrap_or_else(|_| String::from_utf8_lossy(shown).into_owned());
        if bytes.len() > self.max_entity_size {
            text.push_str(MORE);
        }
        text
    }
}

impl fmt::Debug for LoggingInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingInterceptor")
            .field("runtime", &self.runtime)
            .field("level", &self.level)
            .field("verbosity", &self.verbosity)
            .field("max_entity_size", &self.max_entity_size)
            .field("target", &self.target)
            .finish()
    }
}

impl ReaderInterceptor for LoggingInterceptor {
    fn around_read_from(
        &self,
        context: &mut ReaderInterceptorContext<'_>,
    ) -> Result<Option<Entity>> {
        if !self.enabled() {
            return context.proceed();
        }
        let id = self.id(context.properties_mut());
        let note = format!("reading {} as {}", context.entity_type(), context.media_type());
        let mut record = self.head(id, &note, self.prefix(true), context.headers());
        if self.prints_entity(context.media_type()) {
            let mut input = context.input_stream().detach();
            let mut prefix = vec![];
            (&mut input)
                .take(self.max_entity_size as u64 + 1)
                .read_to_end(&mut prefix)?;
            record.push_str(&self.entity_text(&prefix, context.media_type()));
            context.set_input_stream(EntityInputStream::new(chain_buffer(prefix, input)));
        }
        self.log(record.trim_end());
        context.proceed()
    }
}

/// Copies the first `limit` bytes written into `captured`.
struct LoggingStream<'a> {
    inner: Box<dyn Write + 'a>,
    captured: Arc<Mutex<Vec<u8>>>,
    limit: usize,
}

impl<'a> Write for LoggingStream<'a> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        let mut captured = self.captured.lock();
        let room = self.limit.saturating_sub(captured.len());
        captured.extend_from_slice(&buf[..n.min(room)]);
        Ok(n)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl WriterInterceptor for LoggingInterceptor {
    fn around_write_to(&self, context: &mut WriterInterceptorContext<'_>) -> Result<()> {
        if !self.enabled() {
            return context.proceed();
        }
        let id = self.id(context.properties_mut());
        let note = format!("writing {} as {}", context.entity_type(), context.media_type());
        let record = self.head(id, &note, self.prefix(false), context.headers());
        if !self.prints_entity(context.media_type()) {
            self.log(record.trim_end());
            return context.proceed();
        }
        let captured = Arc::new(Mutex::new(vec![]));
        let output = context.take_output_stream();
        context.set_output_stream(Box::new(LoggingStream {
            inner: output,
            captured: captured.clone(),
            limit: self.max_entity_size + 1,
        }));
        context.proceed()?;
        let entity = self.entity_text(&captured.lock(), context.media_type());
        self.log(&format!("{}{}", record, entity));
        Ok(())
    }
}
