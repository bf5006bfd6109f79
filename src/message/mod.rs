//! Types shared by inbound and outbound message processing.
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::hash;
use std::io;

use thiserror::Error;

use crate::config::Configuration;
use crate::header::{HeaderParseError, MediaType};

pub use methods::HeaderMethods;

pub mod chunked;
pub mod committing;
pub mod head;
pub mod inbound;
pub mod interceptor;
pub mod logging;
pub mod methods;
pub mod outbound;

/// Which way a message travels, from the point of view of this runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => f.write_str("inbound"),
            Direction::Outbound => f.write_str("outbound"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("{0}")]
    IllegalState(String),
    #[error("unable to parse \"{name}\" header value \"{value}\" of {direction} message: {source}")]
    HeaderValue {
        name: String,
        value: String,
        direction: Direction,
        #[source]
        source: HeaderParseError,
    },
    #[error("too many \"{name}\" header values: \"{values}\"")]
    TooManyHeaderValues { name: String, values: String },
    #[error("message body reader not found for media type={media_type}, type={entity_type}")]
    ReaderNotFound {
        entity_type: EntityType,
        media_type: MediaType,
    },
    #[error("message body writer not found for media type={media_type}, type={entity_type}")]
    WriterNotFound {
        entity_type: EntityType,
        media_type: MediaType,
    },
    #[error("no content: {0}")]
    NoContent(String),
    #[error("bad request: {0}")]
    BadRequest(#[source] Box<MessageError>),
    #[error("{message}")]
    Processing {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl MessageError {
    pub fn processing(message: &str) -> Self {
        MessageError::Processing {
            message: message.to_string(),
            source: None,
        }
    }
    pub fn processing_caused_by<E>(message: &str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        MessageError::Processing {
            message: message.to_string(),
            source: Some(Box::new(source)),
        }
    }
    pub(crate) fn header_value(
        name: &str,
        value: &str,
        direction: Direction,
        source: HeaderParseError,
    ) -> Self {
        MessageError::HeaderValue {
            name: name.to_string(),
            value: value.to_string(),
            direction,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MessageError>;

/// Runtime description of an entity's Rust type.
#[derive(Debug, Clone, Copy)]
pub struct EntityType {
    id: TypeId,
    name: &'static str,
}

impl EntityType {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
    pub fn id(&self) -> TypeId {
        self.id
    }
    pub fn name(&self) -> &'static str {
        self.name
    }
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityType {}

impl hash::Hash for EntityType {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A message entity of any type.
pub type Entity = Box<dyn Any + Send>;

/// Named properties scoped to one request/response exchange, visible to
/// interceptors.
pub trait PropertiesDelegate: Send {
    fn property(&self, name: &str) -> Option<&str>;
    fn property_names(&self) -> Vec<String>;
    fn set_property(&mut self, name: &str, value: &str);
    fn remove_property(&mut self, name: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct MapPropertiesDelegate {
    properties: BTreeMap<String, String>,
}

impl MapPropertiesDelegate {
    pub fn new() -> Self {
        Self::default()
    }
    /// Start from the configured properties.
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            properties: config.properties.clone(),
        }
    }
}

impl PropertiesDelegate for MapPropertiesDelegate {
    fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
    fn property_names(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }
    fn set_property(&mut self, name: &str, value: &str) {
        self.properties.insert(name.to_string(), value.to_string());
    }
    fn remove_property(&mut self, name: &str) -> Option<String> {
        self.properties.remove(name)
    }
}
