//! Entity providers and the registry that selects them.
//!
//! A [`MessageBodyReader`] turns an entity stream into a value of some
//! [`EntityType`]; a [`MessageBodyWriter`] does the reverse. Both declare
//! the media types they handle, and [`MessageBodyWorkers`] picks the most
//! specific compatible provider for a given type and media type.
//!
//! # Example
//! ```
//! use std::io::Write;
//! use jbrest::content::{MessageBodyWorkers, MessageBodyWriter};
//! use jbrest::header::{HeaderMap, HeaderValue, MediaType};
//! use jbrest::message::{EntityType, Result};
//!
//! struct Shout;
//!
//! impl MessageBodyWriter for Shout {
//!     fn produces(&self) -> Vec<MediaType> {
//!         vec![MediaType::text_plain()]
//!     }
//!     fn is_writeable(&self, entity_type: &EntityType, _: &MediaType) -> bool {
//!         entity_type.is::<String>()
//!     }
//!     fn write_to(
//!         &self,
//!         entity: &mut (dyn std::any::Any + Send),
//!         _: &EntityType,
//!         _: &MediaType,
//!         _: &mut HeaderMap<HeaderValue>,
//!         output: &mut dyn Write,
//!     ) -> Result<()> {
//!         if let Some(s) = entity.downcast_ref::<String>() {
//!             output.write_all(s.to_uppercase().as_bytes())?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut workers = MessageBodyWorkers::with_builtins();
//! workers.register_writer(Shout);
//! let string = EntityType::of::<String>();
//! assert!(workers.writer_for(&string, &MediaType::text_plain()).is_some());
//! ```
use std::any::Any;
use std::io::Write;
use std::sync::Arc;

use log::trace;

use crate::header::{AcceptableMediaType, HeaderMap, HeaderValue, MediaType, Qualified};
use crate::io::EntityInputStream;
use crate::message::{Entity, EntityType, Result};

#[cfg(feature = "json")]
pub mod json;
pub mod providers;

/// Reads entities of the types it accepts from an entity stream.
pub trait MessageBodyReader: Send + Sync {
    /// Media types this reader accepts.
    fn consumes(&self) -> Vec<MediaType> {
        vec![MediaType::wildcard()]
    }
    fn is_readable(&self, entity_type: &EntityType, media_type: &MediaType) -> bool;
    fn read_from(
        &self,
        entity_type: &EntityType,
        media_type: &MediaType,
        headers: &HeaderMap<String>,
        input: &mut EntityInputStream,
    ) -> Result<Entity>;
}

/// Writes entities of the types it accepts to an output stream. Writers may
/// add headers before the first byte is written.
pub trait MessageBodyWriter: Send + Sync {
    /// Media types this writer produces.
    fn produces(&self) -> Vec<MediaType> {
        vec![MediaType::wildcard()]
    }
    fn is_writeable(&self, entity_type: &EntityType, media_type: &MediaType) -> bool;
    fn write_to(
        &self,
        entity: &mut (dyn Any + Send),
        entity_type: &EntityType,
        media_type: &MediaType,
        headers: &mut HeaderMap<HeaderValue>,
        output: &mut dyn Write,
    ) -> Result<()>;
}

struct Registered<P: ?Sized> {
    provider: Arc<P>,
    custom: bool,
}

impl<P: ?Sized> Clone for Registered<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            custom: self.custom,
        }
    }
}

/// Pick the provider whose compatible declared type is most specific,
/// custom before built-in, then first registered.
fn select<'a, P, D, U>(
    providers: &'a [Registered<P>],
    media_type: &MediaType,
    declared: D,
    usable: U,
) -> Option<&'a Arc<P>>
where
    P: ?Sized,
    D: Fn(&P) -> Vec<MediaType>,
    U: Fn(&P) -> bool,
{
    let mut best: Option<((u8, u8), &Arc<P>)> = None;
    for registered in providers {
        let rank = declared(&*registered.provider)
            .iter()
            .filter(|m| m.is_compatible(media_type))
            .map(MediaType::rank)
            .min();
        let rank = match rank {
            Some(rank) => rank,
            None => continue,
        };
        if !usable(&*registered.provider) {
            continue;
        }
        let key = (rank, if registered.custom { 0 } else { 1 });
        match best {
            Some((best_key, _)) if best_key <= key => {}
            _ => best = Some((key, &registered.provider)),
        }
    }
    best.map(|(_, provider)| provider)
}

/// Registry of body readers and writers.
#[derive(Clone, Default)]
pub struct MessageBodyWorkers {
    readers: Vec<Registered<dyn MessageBodyReader>>,
    writers: Vec<Registered<dyn MessageBodyWriter>>,
}

impl MessageBodyWorkers {
    /// A registry without any provider.
    pub fn new() -> Self {
        Self::default()
    }
    /// A registry holding the built-in providers.
    pub fn with_builtins() -> Self {
        let mut workers = Self::new();
        providers::register_builtins(&mut workers);
        workers
    }
    pub fn register_reader<R: MessageBodyReader + 'static>(&mut self, reader: R) -> &mut Self {
        self.readers.push(Registered {
            provider: Arc::new(reader),
            custom: true,
        });
        self
    }
    pub fn register_writer<W: MessageBodyWriter + 'static>(&mut self, writer: W) -> &mut Self {
        self.writers.push(Registered {
            provider: Arc::new(writer),
            custom: true,
        });
        self
    }
    pub(crate) fn register_builtin_reader<R: MessageBodyReader + 'static>(&mut self, reader: R) {
        self.readers.push(Registered {
            provider: Arc::new(reader),
            custom: false,
        });
    }
    pub(crate) fn register_builtin_writer<W: MessageBodyWriter + 'static>(&mut self, writer: W) {
        self.writers.push(Registered {
            provider: Arc::new(writer),
            custom: false,
        });
    }

    pub fn reader_for(
        &self,
        entity_type: &EntityType,
        media_type: &MediaType,
    ) -> Option<Arc<dyn MessageBodyReader>> {
        let reader = select(
            &self.readers,
            media_type,
            |r| r.consumes(),
            |r| r.is_readable(entity_type, media_type),
        )
        .cloned();
        trace!(
            "reader for {} as {}: {}",
            entity_type,
            media_type,
            if reader.is_some() { "found" } else { "none" }
        );
        reader
    }

    pub fn writer_for(
        &self,
        entity_type: &EntityType,
        media_type: &MediaType,
    ) -> Option<Arc<dyn MessageBodyWriter>> {
        let writer = select(
            &self.writers,
            media_type,
            |w| w.produces(),
            |w| w.is_writeable(entity_type, media_type),
        )
        .cloned();
        trace!(
            "writer for {} as {}: {}",
            entity_type,
            media_type,
            if writer.is_some() { "found" } else { "none" }
        );
        writer
    }

    /// Media types the writers for `entity_type` can produce, most specific
    /// first.
    pub fn writer_media_types(&self, entity_type: &EntityType) -> Vec<MediaType> {
        let mut types: Vec<MediaType> = vec![];
        for registered in &self.writers {
            for media_type in registered.provider.produces() {
                if registered.provider.is_writeable(entity_type, &media_type)
                    && !types.contains(&media_type)
                {
                    types.push(media_type);
                }
            }
        }
        types.sort_by_key(MediaType::rank);
        types
    }

    /// First media type of `acceptable`, in order, that a writer for
    /// `entity_type` can produce. A wildcard result is narrowed to
    /// `application/octet-stream`. Unacceptable (`q=0`) entries are skipped.
    pub fn negotiate(
        &self,
        entity_type: &EntityType,
        acceptable: &[AcceptableMediaType],
    ) -> Option<MediaType> {
        let octet_stream = MediaType::application_octet_stream();
        for accepted in acceptable.iter().filter(|a| a.quality() > 0) {
            let accepted = accepted.media_type();
            for registered in &self.writers {
                for produced in registered.provider.produces() {
                    if !produced.is_compatible(accepted) {
                        continue;
                    }
                    let mut candidate = produced.most_specific(accepted).clone();
                    if candidate.is_wildcard_type() || candidate.is_wildcard_subtype() {
                        if !candidate.is_compatible(&octet_stream) {
                            continue;
                        }
                        candidate = octet_stream.clone();
                    }
                    if registered.provider.is_writeable(entity_type, &candidate) {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }
}
