//! Built-in body readers and writers.
use std::any::Any;
use std::io::{self, Write};

use crate::content::{MessageBodyReader, MessageBodyWorkers, MessageBodyWriter};
use crate::header::{HeaderMap, HeaderValue, MediaType};
use crate::io::EntityInputStream;
use crate::message::{Entity, EntityType, MessageError, Result};

const DEFAULT_CHARSET: &str = "utf-8";

pub(crate) fn register_builtins(workers: &mut MessageBodyWorkers) {
    workers.register_builtin_reader(ByteArrayProvider);
    workers.register_builtin_writer(ByteArrayProvider);
    workers.register_builtin_reader(StringProvider);
    workers.register_builtin_writer(StringProvider);
    workers.register_builtin_reader(InputStreamProvider);
    workers.register_builtin_writer(InputStreamProvider);
    workers.register_builtin_reader(BasicTypesProvider);
    workers.register_builtin_writer(BasicTypesProvider);
}

/// Charset of `media_type`, UTF-8 when absent.
pub fn charset(media_type: &MediaType) -> String {
    media_type
        .charset()
        .unwrap_or(DEFAULT_CHARSET)
        .to_ascii_lowercase()
}

/// Decode `bytes` in one of the supported charsets: UTF-8, US-ASCII and
/// ISO-8859-1.
pub fn decode(bytes: Vec<u8>, charset: &str) -> Result<String> {
    match charset {
        "utf-8" | "utf8" => String::from_utf8(bytes)
            .map_err(|e| MessageError::processing_caused_by("entity is not valid UTF-8", e)),
        "us-ascii" | "ascii" => {
            if bytes.iter().any(|b| *b > 127) {
                return Err(MessageError::processing("entity is not valid US-ASCII"));
            }
            Ok(bytes.into_iter().map(char::from).collect())
        }
        "iso-8859-1" | "latin1" => Ok(bytes.into_iter().map(char::from).collect()),
        _ => Err(MessageError::processing(&format!(
            "unsupported charset {}",
            charset
        ))),
    }
}

/// Encode `s` in one of the supported charsets.
pub fn encode(s: &str, charset: &str) -> Result<Vec<u8>> {
    match charset {
        "utf-8" | "utf8" => Ok(s.as_bytes().to_vec()),
        "us-ascii" | "ascii" => {
            if !s.is_ascii() {
                return Err(MessageError::processing(
                    "entity cannot be encoded as US-ASCII",
                ));
            }
            Ok(s.as_bytes().to_vec())
        }
        "iso-8859-1" | "latin1" => s
            .chars()
            .map(|c| {
                if (c as u32) < 256 {
                    Ok(c as u8)
                } else {
                    Err(MessageError::processing(
                        "entity cannot be encoded as ISO-8859-1",
                    ))
                }
            })
            .collect(),
        _ => Err(MessageError::processing(&format!(
            "unsupported charset {}",
            charset
        ))),
    }
}

/// `Vec<u8>` as is, any media type.
pub struct ByteArrayProvider;

impl MessageBodyReader for ByteArrayProvider {
    fn is_readable(&self, entity_type: &EntityType, _: &MediaType) -> bool {
        entity_type.is::<Vec<u8>>()
    }
    fn read_from(
        &self,
        _: &EntityType,
        _: &MediaType,
        _: &HeaderMap<String>,
        input: &mut EntityInputStream,
    ) -> Result<Entity> {
        Ok(Box::new(input.read_all()?))
    }
}

impl MessageBodyWriter for ByteArrayProvider {
    fn is_writeable(&self, entity_type: &EntityType, _: &MediaType) -> bool {
        entity_type.is::<Vec<u8>>()
    }
    fn write_to(
        &self,
        entity: &mut (dyn Any + Send),
        entity_type: &EntityType,
        _: &MediaType,
        _: &mut HeaderMap<HeaderValue>,
        output: &mut dyn Write,
    ) -> Result<()> {
        let bytes = downcast_ref::<Vec<u8>>(entity, entity_type)?;
        output.write_all(bytes)?;
        Ok(())
    }
}

/// `String` in the charset of the media type, any media type.
pub struct StringProvider;

impl MessageBodyReader for StringProvider {
    fn is_readable(&self, entity_type: &EntityType, _: &MediaType) -> bool {
        entity_type.is::<String>()
    }
    fn read_from(
        &self,
        _: &EntityType,
        media_type: &MediaType,
        _: &HeaderMap<String>,
        input: &mut EntityInputStream,
    ) -> Result<Entity> {
        let s = decode(input.read_all()?, &charset(media_type))?;
        Ok(Box::new(s))
    }
}

impl MessageBodyWriter for StringProvider {
    fn is_writeable(&self, entity_type: &EntityType, _: &MediaType) -> bool {
        entity_type.is::<String>()
    }
    fn write_to(
        &self,
        entity: &mut (dyn Any + Send),
        entity_type: &EntityType,
        media_type: &MediaType,
        _: &mut HeaderMap<HeaderValue>,
        output: &mut dyn Write,
    ) -> Result<()> {
        let s = downcast_ref::<String>(entity, entity_type)?;
        output.write_all(&encode(s, &charset(media_type))?)?;
        Ok(())
    }
}

/// Hands the entity stream itself to the application, or copies a stream
/// entity to the output.
pub struct InputStreamProvider;

impl MessageBodyReader for InputStreamProvider {
    fn is_readable(&self, entity_type: &EntityType, _: &MediaType) -> bool {
        entity_type.is::<EntityInputStream>()
    }
    fn read_from(
        &self,
        _: &EntityType,
        _: &MediaType,
        _: &HeaderMap<String>,
        input: &mut EntityInputStream,
    ) -> Result<Entity> {
        Ok(Box::new(input.detach()))
    }
}

impl MessageBodyWriter for InputStreamProvider {
    fn is_writeable(&self, entity_type: &EntityType, _: &MediaType) -> bool {
        entity_type.is::<EntityInputStream>()
    }
    fn write_to(
        &self,
        entity: &mut (dyn Any + Send),
        entity_type: &EntityType,
        _: &MediaType,
        _: &mut HeaderMap<HeaderValue>,
        output: &mut dyn Write,
    ) -> Result<()> {
        let input = entity
            .downcast_mut::<EntityInputStream>()
            .ok_or_else(|| type_mismatch(entity_type))?;
        io::copy(input, output)?;
        input.close();
        Ok(())
    }
}

macro_rules! basic_types {
    ( $( $t:ty ),* $(,)? ) => {
        fn is_basic_type(entity_type: &EntityType) -> bool {
            false $( || entity_type.is::<$t>() )*
        }

        fn parse_basic_type(entity_type: &EntityType, text: &str) -> Result<Entity> {
            $(
                if entity_type.is::<$t>() {
                    return text
                        .parse::<$t>()
                        .map(|value| Box::new(value) as Entity)
                        .map_err(|e| {
                            MessageError::processing_caused_by(
                                &format!("cannot read '{}' as {}", text, entity_type),
                                e,
                            )
                        });
                }
            )*
            Err(type_mismatch(entity_type))
        }

        fn format_basic_type(entity: &(dyn Any + Send)) -> Option<String> {
            $(
                if let Some(value) = entity.downcast_ref::<$t>() {
                    return Some(value.to_string());
                }
            )*
            None
        }
    };
}

basic_types!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char,
);

/// Numbers, `bool` and `char` as `text/plain`. An empty entity is a
/// [`MessageError::NoContent`] failure.
pub struct BasicTypesProvider;

impl MessageBodyReader for BasicTypesProvider {
    fn consumes(&self) -> Vec<MediaType> {
        vec![MediaType::text_plain()]
    }
    fn is_readable(&self, entity_type: &EntityType, _: &MediaType) -> bool {
        is_basic_type(entity_type)
    }
    fn read_from(
        &self,
        entity_type: &EntityType,
        media_type: &MediaType,
        _: &HeaderMap<String>,
        input: &mut EntityInputStream,
    ) -> Result<Entity> {
        let text = decode(input.read_all()?, &charset(media_type))?;
        if text.is_empty() {
            return Err(MessageError::NoContent(format!(
                "empty entity cannot be read as {}",
                entity_type
            )));
        }
        parse_basic_type(entity_type, &text)
    }
}

impl MessageBodyWriter for BasicTypesProvider {
    fn produces(&self) -> Vec<MediaType> {
        vec![MediaType::text_plain()]
    }
    fn is_writeable(&self, entity_type: &EntityType, _: &MediaType) -> bool {
        is_basic_type(entity_type)
    }
    fn write_to(
        &self,
        entity: &mut (dyn Any + Send),
        entity_type: &EntityType,
        media_type: &MediaType,
        _: &mut HeaderMap<HeaderValue>,
        output: &mut dyn Write,
    ) -> Result<()> {
        let text = format_basic_type(entity).ok_or_else(|| type_mismatch(entity_type))?;
        output.write_all(&encode(&text, &charset(media_type))?)?;
        Ok(())
    }
}

fn type_mismatch(entity_type: &EntityType) -> MessageError {
    MessageError::processing(&format!("entity is not a {}", entity_type))
}

fn downcast_ref<'a, T: Any>(
    entity: &'a (dyn Any + Send),
    entity_type: &EntityType,
) -> Result<&'a T> {
    entity
        .downcast_ref::<T>()
        .ok_or_else(|| type_mismatch(entity_type))
}

#[cfg(test)]
mod test {
    use super::*;

    fn read<T: Any>(media_type: &MediaType, bytes: &'static [u8]) -> Result<T> {
        let workers = MessageBodyWorkers::with_builtins();
        let entity_type = EntityType::of::<T>();
        let reader = workers.reader_for(&entity_type, media_type).unwrap();
        let mut input = EntityInputStream::new(bytes);
        let entity = reader.read_from(&entity_type, media_type, &HeaderMap::new(), &mut input)?;
        Ok(*entity.downcast::<T>().unwrap())
    }

    fn write<T: Any + Send>(media_type: &MediaType, mut entity: T) -> Result<Vec<u8>> {
        let workers = MessageBodyWorkers::with_builtins();
        let entity_type = EntityType::of::<T>();
        let writer = workers.writer_for(&entity_type, media_type).unwrap();
        let mut out = vec![];
        writer.write_to(
            &mut entity,
            &entity_type,
            media_type,
            &mut HeaderMap::new(),
            &mut out,
        )?;
        Ok(out)
    }

    #[test]
    fn test_bytes_and_strings() {
        let octets = MediaType::application_octet_stream();
        assert_eq!(read::<Vec<u8>>(&octets, b"\x00\xff").unwrap(), vec![0, 255]);
        assert_eq!(
            read::<String>(&MediaType::text_plain(), "h\u{e9}".as_bytes()).unwrap(),
            "h\u{e9}"
        );
        let latin1 = MediaType::text_plain().with_charset("ISO-8859-1");
        assert_eq!(read::<String>(&latin1, b"h\xe9").unwrap(), "h\u{e9}");
        assert_eq!(write(&latin1, "h\u{e9}".to_string()).unwrap(), b"h\xe9".to_vec());
        let ascii = MediaType::text_plain().with_charset("us-ascii");
        assert!(read::<String>(&ascii, b"h\xe9").is_err());
        assert!(write(&ascii, "h\u{e9}".to_string()).is_err());
        assert!(read::<String>(&MediaType::text_plain(), b"\xff").is_err());
    }

    #[test]
    fn test_basic_types() {
        let plain = MediaType::text_plain();
        assert_eq!(read::<i32>(&plain, b"-42").unwrap(), -42);
        assert_eq!(read::<f64>(&plain, b"2.5").unwrap(), 2.5);
        assert!(read::<bool>(&plain, b"true").unwrap());
        assert_eq!(read::<char>(&plain, b"x").unwrap(), 'x');
        assert!(read::<char>(&plain, b"xy").is_err());
        assert!(read::<u8>(&plain, b"256").is_err());
        match read::<u64>(&plain, b"") {
            Err(MessageError::NoContent(_)) => {}
            other => panic!("expected no content, got {:?}", other.map(|_| ())),
        }
        assert_eq!(write(&plain, 17u16).unwrap(), b"17".to_vec());
        let workers = MessageBodyWorkers::with_builtins();
        assert!(workers
            .reader_for(&EntityType::of::<i32>(), &MediaType::application_json())
            .is_none());
    }

    #[test]
    fn test_input_stream() {
        let octets = MediaType::application_octet_stream();
        let mut stream = read::<EntityInputStream>(&octets, b"raw").unwrap();
        assert_eq!(stream.read_all().unwrap(), b"raw".to_vec());
        let stream = EntityInputStream::new(&b"copied"[..]);
        assert_eq!(write(&octets, stream).unwrap(), b"copied".to_vec());
    }
}
