//! Output stream that defers opening the real stream until the first
//! bytes must go out.
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;

use crate::message::{MessageError, Result};

/// Opens the real output stream on commit. `content_length` is known when
/// the whole entity fit in the buffer.
pub trait StreamProvider: Send {
    fn output_stream(&mut self, content_length: Option<usize>) -> io::Result<Box<dyn Write + Send>>;
}

impl<F> StreamProvider for F
where
    F: FnMut(Option<usize>) -> io::Result<Box<dyn Write + Send>> + Send,
{
    fn output_stream(&mut self, content_length: Option<usize>) -> io::Result<Box<dyn Write + Send>> {
        self(content_length)
    }
}

/// Used when the stream is closed without ever being given a provider.
struct NullStreamProvider;

impl StreamProvider for NullStreamProvider {
    fn output_stream(&mut self, _: Option<usize>) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(io::sink()))
    }
}

/// Nothing is written to the real stream before commit. With buffering
/// enabled, writes are held in memory until they outgrow the buffer or the
/// stream is closed; an entity that fits is committed with its exact length.
///
/// ```
/// use std::io::Write;
/// use jbrest::message::committing::CommittingOutputStream;
///
/// let mut out = CommittingOutputStream::new();
/// out.enable_buffering(16).unwrap();
/// out.set_stream_provider(|length: Option<usize>| -> std::io::Result<Box<dyn Write + Send>> {
///     assert_eq!(length, Some(5));
///     Ok(Box::new(std::io::sink()))
/// });
/// out.write_all(b"hello").unwrap();
/// assert!(!out.is_committed());
/// out.close().unwrap();
/// assert!(out.is_committed());
/// ```
pub struct CommittingOutputStream {
    provider: Option<Box<dyn StreamProvider>>,
    output: Option<Box<dyn Write + Send>>,
    buffer: Option<Vec<u8>>,
    buffer_size: usize,
    committed: bool,
    closed: bool,
}

impl Default for CommittingOutputStream {
    fn default() -> Self {
        Self::new()
    }
}

impl CommittingOutputStream {
    pub fn new() -> Self {
        Self {
            provider: None,
            output: None,
            buffer: None,
            buffer_size: 0,
            committed: false,
            closed: false,
        }
    }

    pub fn set_stream_provider<P: StreamProvider + 'static>(&mut self, provider: P) {
        self.provider = Some(Box::new(provider));
    }

    /// Hold up to `size` bytes before committing. 0 disables buffering.
    /// Must be called before anything is written.
    pub fn enable_buffering(&mut self, size: usize) -> Result<()> {
        if self.committed || self.buffer.as_ref().map_or(false, |b| !b.is_empty()) {
            return Err(MessageError::IllegalState(
                "buffering cannot be enabled once the stream has been written to".to_string(),
            ));
        }
        self.buffer_size = size;
        self.buffer = if size > 0 { Some(vec![]) } else { None };
        Ok(())
    }
    pub fn is_buffering(&self) -> bool {
        self.buffer.is_some()
    }
    pub fn is_committed(&self) -> bool {
        self.committed
    }
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn open(&mut self, content_length: Option<usize>) -> io::Result<()> {
        if self.committed {
            return Ok(());
        }
        let provider = self.provider.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "stream provider has not been set")
        })?;
        trace!("committing stream, content length {:?}", content_length);
        self.output = Some(provider.output_stream(content_length)?);
        self.committed = true;
        Ok(())
    }

    /// Commit and write out whatever is buffered. At the end of the stream
    /// the buffered size is the content length.
    fn flush_buffer(&mut self, end_of_stream: bool) -> io::Result<()> {
        match self.buffer.take() {
            Some(buffer) => {
                let length = if end_of_stream { Some(buffer.len()) } else { None };
                self.open(length)?;
                self.output_mut()?.write_all(&buffer)
            }
            None => self.open(None),
        }
    }

    fn output_mut(&mut self) -> io::Result<&mut (dyn Write + Send)> {
        match self.output.as_mut() {
            Some(output) => Ok(output.as_mut()),
            None => Err(io::Error::new(io::ErrorKind::Other, "stream not committed")),
        }
    }

    /// Open the real stream now. Buffered bytes are written out and their
    /// count is passed on as the content length.
    pub fn commit(&mut self) -> io::Result<()> {
        if !self.committed {
            self.flush_buffer(true)?;
        }
        Ok(())
    }

    /// Commit if needed, then flush and drop the real stream. Idempotent.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.provider.is_none() {
            self.provider = Some(Box::new(NullStreamProvider));
        }
        self.commit()?;
        match self.output.take() {
            Some(mut output) => output.flush(),
            None => Ok(()),
        }
    }
}

impl Write for CommittingOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::Other, "stream is closed"));
        }
        if let Some(buffer) = self.buffer.as_mut() {
            if buffer.len() + buf.len() <= self.buffer_size {
                buffer.extend_from_slice(buf);
                return Ok(buf.len());
            }
            self.flush_buffer(false)?;
        } else {
            self.open(None)?;
        }
        self.output_mut()?.write(buf)
    }

    /// Buffered bytes stay buffered.
    fn flush(&mut self) -> io::Result<()> {
        match self.output.as_mut() {
            Some(output) if self.committed => output.flush(),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for CommittingOutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommittingOutputStream")
            .field("buffered", &self.buffer.as_ref().map(Vec::len))
            .field("buffer_size", &self.buffer_size)
            .field("committed", &self.committed)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Shared handle to a [`CommittingOutputStream`], so entity stream
/// wrappers can write to it while its owner still controls commit and
/// close.
#[derive(Clone, Debug, Default)]
pub struct CommittingWriter(Arc<Mutex<CommittingOutputStream>>);

impl CommittingWriter {
    pub fn new(stream: CommittingOutputStream) -> Self {
        Self(Arc::new(Mutex::new(stream)))
    }
    pub fn lock(&self) -> parking_lot::MutexGuard<'_, CommittingOutputStream> {
        self.0.lock()
    }
}

impl Write for CommittingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().flush()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn stream(buffer: usize) -> (CommittingOutputStream, Sink, Arc<Mutex<Vec<Option<usize>>>>) {
        let sink = Sink::default();
        let lengths = Arc::new(Mutex::new(vec![]));
        let mut out = CommittingOutputStream::new();
        out.enable_buffering(buffer).unwrap();
        let (provider_sink, provider_lengths) = (sink.clone(), lengths.clone());
        out.set_stream_provider(
            move |length: Option<usize>| -> io::Result<Box<dyn Write + Send>> {
                provider_lengths.lock().push(length);
                Ok(Box::new(provider_sink.clone()))
            },
        );
        (out, sink, lengths)
    }

    #[test]
    fn test_small_entity_gets_exact_length() {
        let (mut out, sink, lengths) = stream(8);
        out.write_all(b"abc").unwrap();
        out.flush().unwrap();
        assert!(!out.is_committed());
        assert!(sink.0.lock().is_empty());
        out.close().unwrap();
        out.close().unwrap();
        assert_eq!(*lengths.lock(), vec![Some(3)]);
        assert_eq!(*sink.0.lock(), b"abc".to_vec());
        assert!(out.write(b"x").is_err());
    }

    #[test]
    fn test_overflow_commits_without_length() {
        let (mut out, sink, lengths) = stream(4);
        out.write_all(b"abc").unwrap();
        out.write_all(b"defg").unwrap();
        assert!(out.is_committed());
        out.write_all(b"h").unwrap();
        out.close().unwrap();
        assert_eq!(*lengths.lock(), vec![None]);
        assert_eq!(*sink.0.lock(), b"abcdefgh".to_vec());
    }

    #[test]
    fn test_unbuffered_commits_on_first_write() {
        let (mut out, sink, lengths) = stream(0);
        assert!(!out.is_buffering());
        out.write_all(b"a").unwrap();
        assert!(out.is_committed());
        assert_eq!(*sink.0.lock(), b"a".to_vec());
        assert_eq!(*lengths.lock(), vec![None]);
        assert!(out.enable_buffering(10).is_err());
    }

    #[test]
    fn test_commit_empty_and_close_without_provider() {
        let (mut out, _, lengths) = stream(8);
        out.commit().unwrap();
        assert_eq!(*lengths.lock(), vec![Some(0)]);

        let mut out = CommittingOutputStream::new();
        assert!(out.write(b"a").is_err());
        let mut out = CommittingOutputStream::new();
        out.close().unwrap();
        assert!(out.is_committed());
    }

    #[test]
    fn test_shared_writer() {
        let (out, sink, _) = stream(0);
        let shared = CommittingWriter::new(out);
        let mut writer = shared.clone();
        writer.write_all(b"shared").unwrap();
        shared.lock().close().unwrap();
        assert_eq!(*sink.0.lock(), b"shared".to_vec());
    }
}
