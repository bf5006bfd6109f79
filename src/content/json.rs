//! JSON entities for types that implement [`serde::Serialize`] and
//! [`serde::Deserialize`], via [`serde_json`].
//!
//! ```
//! use jbrest::content::json::JsonProvider;
//! use jbrest::content::MessageBodyWorkers;
//! use jbrest::header::MediaType;
//! use jbrest::message::EntityType;
//!
//! #[derive(serde::Serialize, serde::Deserialize)]
//! struct Person {
//!     name: String,
//! }
//!
//! let mut workers = MessageBodyWorkers::with_builtins();
//! workers.register_reader(JsonProvider::<Person>::new());
//! workers.register_writer(JsonProvider::<Person>::new());
//! let person = EntityType::of::<Person>();
//! let hal = MediaType::new("application", "hal+json");
//! assert!(workers.reader_for(&person, &hal).is_some());
//! assert!(workers.writer_for(&person, &MediaType::text_plain()).is_none());
//! ```
use std::any::Any;
use std::io::Write;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::content::{MessageBodyReader, MessageBodyWriter};
use crate::header::{HeaderMap, HeaderValue, MediaType};
use crate::io::EntityInputStream;
use crate::message::{Entity, EntityType, MessageError, Result};

/// Reads and writes `T` as `application/json` or any `+json` media type.
pub struct JsonProvider<T> {
    phantom: PhantomData<fn() -> T>,
}

impl<T> JsonProvider<T> {
    pub fn new() -> Self {
        Self {
            phantom: PhantomData,
        }
    }
}

impl<T> Default for JsonProvider<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn json_types() -> Vec<MediaType> {
    vec![
        MediaType::application_json(),
        MediaType::new("application", "*"),
    ]
}

impl<T> MessageBodyReader for JsonProvider<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn consumes(&self) -> Vec<MediaType> {
        json_types()
    }
    fn is_readable(&self, entity_type: &EntityType, media_type: &MediaType) -> bool {
        entity_type.is::<T>() && media_type.is_json()
    }
    fn read_from(
        &self,
        entity_type: &EntityType,
        _: &MediaType,
        _: &HeaderMap<String>,
        input: &mut EntityInputStream,
    ) -> Result<Entity> {
        let bytes = input.read_all()?;
        if bytes.is_empty() {
            return Err(MessageError::NoContent(format!(
                "empty entity cannot be read as {}",
                entity_type
            )));
        }
        let value: T = serde_json::from_slice(&bytes)
            .map_err(|e| MessageError::processing_caused_by("invalid JSON entity", e))?;
        Ok(Box::new(value))
    }
}

impl<T> MessageBodyWriter for JsonProvider<T>
where
    T: Serialize + Send + 'static,
{
    fn produces(&self) -> Vec<MediaType> {
        json_types()
    }
    fn is_writeable(&self, entity_type: &EntityType, media_type: &MediaType) -> bool {
        entity_type.is::<T>() && (media_type.is_json() || media_type.is_wildcard_subtype())
    }
    fn write_to(
        &self,
        entity: &mut (dyn Any + Send),
        entity_type: &EntityType,
        _: &MediaType,
        _: &mut HeaderMap<HeaderValue>,
        output: &mut dyn Write,
    ) -> Result<()> {
        let value = entity.downcast_ref::<T>().ok_or_else(|| {
            MessageError::processing(&format!("entity is not a {}", entity_type))
        })?;
        serde_json::to_writer(output, value)
            .map_err(|e| MessageError::processing_caused_by("JSON serialization failed", e))
    }
}
