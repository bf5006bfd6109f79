//! HTTP message processing for REST runtimes. This is a learning project, use at your own risk.
//! * Typed [header values](crate::header) with their HTTP grammar, and
//!   [quality-ordered](crate::header::list) `Accept*` lists
//! * [Body readers and writers](crate::content) selected by entity type and
//!   media type, with [content negotiation](crate::content::MessageBodyWorkers::negotiate)
//! * [JSON entities](crate::content::json) with [`serde_json`](serde_json)
//! * [Reader and writer interceptor](crate::message::interceptor) chains, and an
//!   [entity logging](crate::message::logging) interceptor
//! * [Inbound](crate::message::inbound::InboundMessageContext) and
//!   [outbound](crate::message::outbound::OutboundMessageContext) message
//!   contexts managing the entity stream
//! * [Chunked entities](crate::message::chunked) and an HTTP/1.x
//!   [message head](crate::message::head) reader
//!
//! # Example
//! ```
//! use std::io::Write;
//! use std::sync::Arc;
//! use jbrest::prelude::*;
//! use jbrest::message::head::{write_head, HeadParser, StartLine};
//!
//! let workers = Arc::new(MessageBodyWorkers::with_builtins());
//! let request = &b"POST /sum HTTP/1.1\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nAccept: text/*\r\n\r\n40"[..];
//!
//! let mut parser = HeadParser::new(request);
//! let head = parser.parse_request().unwrap();
//! let mut inbound = parser
//!     .into_inbound_context(head, Configuration::server())
//!     .unwrap()
//!     .with_workers(workers.clone());
//! let mut properties = MapPropertiesDelegate::new();
//! let n: u32 = inbound.read_entity(&mut properties).unwrap().unwrap();
//!
//! let accept = inbound.qualified_acceptable_media_types().unwrap();
//! let media_type = workers.negotiate(&EntityType::of::<u32>(), &accept).unwrap();
//! assert_eq!(media_type, MediaType::text_plain());
//!
//! let mut outbound = OutboundMessageContext::new(Configuration::server())
//!     .with_workers(workers);
//! outbound.set_media_type(media_type);
//! outbound.set_entity(n + 2);
//! outbound.enable_buffering().unwrap();
//! let headers = outbound.string_headers();
//! outbound.set_stream_provider(move |length: Option<usize>| -> std::io::Result<Box<dyn Write + Send>> {
//!     let mut headers = headers.clone();
//!     if let Some(length) = length {
//!         headers.put_single("Content-Length", length.to_string());
//!     }
//!     let mut out = std::io::stdout();
//!     write_head(&mut out, &StartLine::status(200, "OK"), &headers)?;
//!     Ok(Box::new(out))
//! });
//! outbound.write_entity(&mut properties).unwrap();
//! outbound.close();
//! ```
pub mod config;
pub mod content;
pub mod header;
pub mod io;
pub mod message;
pub mod prelude;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
