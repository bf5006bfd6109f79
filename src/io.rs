//! I/O utilities.
use std::fmt;
use std::io;
use std::io::prelude::*;

/// Entity stream of an inbound message.
///
/// Wraps the raw input with a one byte look-ahead so emptiness can be
/// checked without losing data, and refuses reads once closed.
pub struct EntityInputStream {
    inner: Box<dyn Read + Send>,
    peeked: Option<u8>,
    closed: bool,
}

impl EntityInputStream {
    pub fn new<R: Read + Send + 'static>(inner: R) -> Self {
        Self::from_boxed(Box::new(inner))
    }
    pub fn from_boxed(inner: Box<dyn Read + Send>) -> Self {
        Self {
            inner,
            peeked: None,
            closed: false,
        }
    }
    pub fn empty() -> Self {
        Self::new(io::empty())
    }
    fn ensure_not_closed(&self) -> io::Result<()> {
        if self.closed {
            Err(io::Error::new(
                io::ErrorKind::Other,
                "entity input stream has been closed",
            ))
        } else {
            Ok(())
        }
    }
    /// True if no byte can be read. May block until one arrives.
    pub fn is_empty(&mut self) -> io::Result<bool> {
        self.ensure_not_closed()?;
        if self.peeked.is_some() {
            return Ok(false);
        }
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(true),
                Ok(_) => {
                    self.peeked = Some(byte[0]);
                    return Ok(false);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
    /// Release the underlying stream; further reads fail. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.peeked = None;
            self.inner = Box::new(io::empty());
        }
    }
    pub fn is_closed(&self) -> bool {
        self.closed
    }
    /// Take the stream out, leaving an empty one behind.
    pub fn detach(&mut self) -> EntityInputStream {
        std::mem::replace(self, EntityInputStream::empty())
    }
    /// Read everything that is left.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = vec![];
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl Read for EntityInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_not_closed()?;
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(b) = self.peeked.take() {
            buf[0] = b;
            let n = match self.inner.read(&mut buf[1..]) {
                Ok(n) => n,
                // the peeked byte is already delivered
                Err(e) if e.kind() == io::ErrorKind::Interrupted => 0,
                Err(e) => {
                    self.peeked = Some(b);
                    return Err(e);
                }
            };
            return Ok(n + 1);
        }
        self.inner.read(buf)
    }
}

impl fmt::Debug for EntityInputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityInputStream")
            .field("peeked", &self.peeked)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Combine a consumed prefix with the rest of a stream, e.g. bytes a
/// parser buffered past the message head.
pub fn chain_buffer<R: Read + Send + 'static>(
    buffered: Vec<u8>,
    rest: R,
) -> impl Read + Send + 'static {
    io::Cursor::new(buffered).chain(rest)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_peek_keeps_data() {
        let mut stream = EntityInputStream::new(&b"hello"[..]);
        assert!(!stream.is_empty().unwrap());
        assert!(!stream.is_empty().unwrap());
        assert_eq!(stream.read_all().unwrap(), b"hello".to_vec());
        assert!(stream.is_empty().unwrap());
    }

    #[test]
    fn test_small_reads_after_peek() {
        let mut stream = EntityInputStream::new(&b"ab"[..]);
        stream.is_empty().unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(stream.read(&mut buf).unwrap(), 1);
        assert_eq!(&buf, b"a");
        assert_eq!(stream.read(&mut buf).unwrap(), 1);
        assert_eq!(&buf, b"b");
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_close() {
        let mut stream = EntityInputStream::new(&b"data"[..]);
        stream.close();
        stream.close();
        assert!(stream.is_closed());
        assert!(stream.read_all().is_err());
        assert!(stream.is_empty().is_err());
    }

    #[test]
    fn test_detach() {
        let mut stream = EntityInputStream::new(&b"data"[..]);
        let mut detached = stream.detach();
        assert!(stream.is_empty().unwrap());
        assert_eq!(detached.read_all().unwrap(), b"data".to_vec());
    }

    #[test]
    fn test_chain_buffer() {
        let mut chained = chain_buffer(b"head".to_vec(), &b"tail"[..]);
        let mut buf = String::new();
        chained.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "headtail");
    }
}
