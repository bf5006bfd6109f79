pub use crate::config::Configuration;
pub use crate::content::{MessageBodyReader, MessageBodyWorkers, MessageBodyWriter};
pub use crate::header::{
    AcceptableLanguageTag, AcceptableMediaType, HeaderMap, HeaderValue, MediaType,
};
pub use crate::io::EntityInputStream;
pub use crate::message::inbound::InboundMessageContext;
pub use crate::message::interceptor::{
    ReaderInterceptor, ReaderInterceptorContext, WriterInterceptor, WriterInterceptorContext,
};
pub use crate::message::logging::LoggingInterceptor;
pub use crate::message::outbound::OutboundMessageContext;
pub use crate::message::{
    Entity, EntityType, HeaderMethods, MapPropertiesDelegate, MessageError, PropertiesDelegate,
};
