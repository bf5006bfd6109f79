//! Entity streams made of delimited chunks.
use std::any::Any;
use std::io::{self, Read};
use std::sync::Arc;

use log::{debug, warn};

use crate::content::MessageBodyWorkers;
use crate::header::{HeaderMap, MediaType};
use crate::io::EntityInputStream;
use crate::message::interceptor::{ReaderInterceptor, ReaderInterceptorContext};
use crate::message::{EntityType, MapPropertiesDelegate, MessageError, Result};

/// Splits a stream into chunks.
pub trait ChunkParser: Send {
    /// Next chunk, `None` at the end of the stream.
    fn read_chunk(&self, input: &mut dyn Read) -> io::Result<Option<Vec<u8>>>;
}

/// Chunks separated by a fixed byte sequence. Empty chunks are skipped, and
/// data left at the end of the stream is the last chunk, even when it ends
/// in part of a delimiter.
///
/// ```
/// use jbrest::message::chunked::{BoundaryChunkParser, ChunkParser};
///
/// let parser = BoundaryChunkParser::new(b"1234");
/// let mut input = &b"abc1234def"[..];
/// assert_eq!(parser.read_chunk(&mut input).unwrap(), Some(b"abc".to_vec()));
/// assert_eq!(parser.read_chunk(&mut input).unwrap(), Some(b"def".to_vec()));
/// assert_eq!(parser.read_chunk(&mut input).unwrap(), None);
/// ```
#[derive(Debug, Clone)]
pub struct BoundaryChunkParser {
    delimiter: Vec<u8>,
}

impl BoundaryChunkParser {
    pub fn new(delimiter: &[u8]) -> Self {
        Self {
            delimiter: delimiter.to_vec(),
        }
    }
    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }
}

impl Default for BoundaryChunkParser {
    /// Chunks separated by `\r\n\r\n`.
    fn default() -> Self {
        Self::new(b"\r\n\r\n")
    }
}

fn read_byte(input: &mut dyn Read) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match input.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

impl ChunkParser for BoundaryChunkParser {
    fn read_chunk(&self, input: &mut dyn Read) -> io::Result<Option<Vec<u8>>> {
        let mut chunk: Vec<u8> = vec![];
        while let Some(byte) = read_byte(input)? {
            chunk.push(byte);
            if !self.delimiter.is_empty() && chunk.ends_with(&self.delimiter) {
                chunk.truncate(chunk.len() - self.delimiter.len());
                if !chunk.is_empty() {
                    return Ok(Some(chunk));
                }
            }
        }
        if chunk.is_empty() {
            Ok(None)
        } else {
            Ok(Some(chunk))
        }
    }
}

/// Reads a chunked entity one chunk at a time, either raw or converted by
/// the body readers. Iterating yields raw chunks.
pub struct ChunkedInput {
    input: EntityInputStream,
    parser: Box<dyn ChunkParser>,
    media_type: MediaType,
    headers: HeaderMap<String>,
    interceptors: Vec<Arc<dyn ReaderInterceptor>>,
    closed: bool,
}

impl ChunkedInput {
    pub fn new<P: ChunkParser + 'static>(input: EntityInputStream, parser: P) -> Self {
        Self {
            input,
            parser: Box::new(parser),
            media_type: MediaType::application_octet_stream(),
            headers: HeaderMap::new(),
            interceptors: vec![],
            closed: false,
        }
    }
    /// Media type each chunk is read as.
    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = media_type;
        self
    }
    pub fn with_headers(mut self, headers: HeaderMap<String>) -> Self {
        self.headers = headers;
        self
    }
    pub fn with_interceptors(mut self, interceptors: Vec<Arc<dyn ReaderInterceptor>>) -> Self {
        self.interceptors = interceptors;
        self
    }
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    /// Next raw chunk. The input is closed at the end of the stream or on
    /// failure; a closed input yields nothing.
    pub fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.closed {
            return Ok(None);
        }
        match self.parser.read_chunk(&mut self.input) {
            Ok(Some(chunk)) => Ok(Some(chunk)),
            Ok(None) => {
                self.close();
                Ok(None)
            }
            Err(e) => {
                warn!("reading chunk failed: {}", e);
                self.close();
                Err(e.into())
            }
        }
    }

    /// Next chunk converted to `T` by the body reader for the chunk media
    /// type.
    pub fn read<T: Any>(&mut self, workers: &MessageBodyWorkers) -> Result<Option<T>> {
        let chunk = match self.read_chunk()? {
            Some(chunk) => chunk,
            None => return Ok(None),
        };
        let entity_type = EntityType::of::<T>();
        let mut properties = MapPropertiesDelegate::new();
        let mut input = EntityInputStream::new(io::Cursor::new(chunk));
        let entity = ReaderInterceptorContext::new(
            &self.interceptors,
            workers,
            entity_type,
            self.media_type.clone(),
            &mut self.headers,
            &mut properties,
            &mut input,
        )
        .proceed()?;
        match entity {
            Some(entity) => entity.downcast::<T>().map(|t| Some(*t)).map_err(|_| {
                MessageError::processing(&format!("chunk was not read as {}", entity_type))
            }),
            None => Ok(None),
        }
    }

    /// Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            debug!("closing chunked input");
            self.closed = true;
            self.input.close();
        }
    }
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Iterator for ChunkedInput {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_chunk().transpose()
    }
}
