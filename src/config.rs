//! Runtime configuration for message processing.
//!
//! ```
//! use jbrest::config::{Configuration, RuntimeType};
//!
//! let config = Configuration::client().with_tracing(true);
//! assert_eq!(config.runtime, RuntimeType::Client);
//! assert!(!config.translates_no_content());
//! assert_eq!(config.outbound_content_length_buffer, 8192);
//! ```
use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_OUTBOUND_CONTENT_LENGTH_BUFFER: usize = 8192;
pub const DEFAULT_LOGGING_MAX_ENTITY_SIZE: usize = 8 * 1024;
const ENV_PREFIX: &str = "JBREST_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeType {
    Client,
    Server,
}

/// How much of a message the
/// [`LoggingInterceptor`](crate::message::logging::LoggingInterceptor)
/// records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verbosity {
    HeadersOnly,
    /// Entities of textual media types, headers only for the rest.
    PayloadText,
    PayloadAny,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::PayloadText
    }
}

impl FromStr for Verbosity {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, ()> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "headers-only" => Ok(Verbosity::HeadersOnly),
            "payload-text" => Ok(Verbosity::PayloadText),
            "payload-any" => Ok(Verbosity::PayloadAny),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[cfg(feature = "json")]
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value '{value}' for {name}")]
    InvalidValue { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    pub runtime: RuntimeType,
    /// Bytes of outbound entity buffered before committing, so that small
    /// entities can be sent with an exact `Content-Length`. 0 disables.
    pub outbound_content_length_buffer: usize,
    /// Turn empty-entity failures of body readers into bad requests.
    /// Unset means on for servers and off for clients.
    pub translate_no_content: Option<bool>,
    /// Log each interceptor invocation at trace level with timings.
    pub tracing: bool,
    pub logging_verbosity: Verbosity,
    /// Entity bytes recorded by the logging interceptor; the rest is
    /// marked as `...more...`.
    pub logging_max_entity_size: usize,
    pub properties: BTreeMap<String, String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            runtime: RuntimeType::Server,
            outbound_content_length_buffer: DEFAULT_OUTBOUND_CONTENT_LENGTH_BUFFER,
            translate_no_content: None,
            tracing: false,
            logging_verbosity: Verbosity::default(),
            logging_max_entity_size: DEFAULT_LOGGING_MAX_ENTITY_SIZE,
            properties: BTreeMap::new(),
        }
    }
}

impl Configuration {
    pub fn server() -> Self {
        Self::default()
    }
    pub fn client() -> Self {
        Self {
            runtime: RuntimeType::Client,
            ..Self::default()
        }
    }
    pub fn with_outbound_content_length_buffer(mut self, size: usize) -> Self {
        self.outbound_content_length_buffer = size;
        self
    }
    pub fn with_translate_no_content(mut self, translate: bool) -> Self {
        self.translate_no_content = Some(translate);
        self
    }
    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.tracing = tracing;
        self
    }
    pub fn with_logging_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.logging_verbosity = verbosity;
        self
    }
    pub fn with_logging_max_entity_size(mut self, size: usize) -> Self {
        self.logging_max_entity_size = size;
        self
    }
    pub fn with_property(mut self, name: &str, value: &str) -> Self {
        self.properties.insert(name.to_string(), value.to_string());
        self
    }
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
    pub fn translates_no_content(&self) -> bool {
        self.translate_no_content
            .unwrap_or(self.runtime == RuntimeType::Server)
    }

    #[cfg(feature = "json")]
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read `JBREST_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// `JBREST_RUNTIME`, `JBREST_OUTBOUND_CONTENT_LENGTH_BUFFER`,
    /// `JBREST_TRANSLATE_NO_CONTENT`, `JBREST_TRACING`,
    /// `JBREST_LOGGING_VERBOSITY`, `JBREST_LOGGING_MAX_ENTITY_SIZE`; any other
    /// `JBREST_PROPERTY_<NAME>` becomes a property named `<name>`.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::default();
        for (name, value) in vars {
            let key = match name.strip_prefix(ENV_PREFIX) {
                Some(key) => key,
                None => continue,
            };
            let invalid = || ConfigError::InvalidValue {
                name: name.clone(),
                value: value.clone(),
            };
            match key {
                "RUNTIME" => {
                    config.runtime = match value.to_ascii_lowercase().as_str() {
                        "client" => RuntimeType::Client,
                        "server" => RuntimeType::Server,
                        _ => return Err(invalid()),
                    }
                }
                "OUTBOUND_CONTENT_LENGTH_BUFFER" => {
                    config.outbound_content_length_buffer =
                        value.parse().map_err(|_| invalid())?
                }
                "TRANSLATE_NO_CONTENT" => {
                    config.translate_no_content = Some(parse_bool(&value).ok_or_else(invalid)?)
                }
                "TRACING" => config.tracing = parse_bool(&value).ok_or_else(invalid)?,
                "LOGGING_VERBOSITY" => {
                    config.logging_verbosity = value.parse().map_err(|_| invalid())?
                }
                "LOGGING_MAX_ENTITY_SIZE" => {
                    config.logging_max_entity_size = value.parse().map_err(|_| invalid())?
                }
                _ => {
                    if let Some(property) = key.strip_prefix("PROPERTY_") {
                        config
                            .properties
                            .insert(property.to_ascii_lowercase(), value.clone());
                    }
                }
            }
        }
        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
