//! Stream wrappers for observing and breaking session I/O.

use std::{
    io,
    pin::Pin,
    sync::{Arc, Mutex, PoisonError},
    task::{Context, Poll},
};

use talkline_client::Shutdown;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// One successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    /// Bytes accepted by the inner stream.
    pub bytes: Vec<u8>,
    /// Whether the shutdown signal was already set when the write happened.
    pub after_shutdown: bool,
}

/// Wraps a stream and logs each write with the shutdown state at that time.
#[derive(Debug)]
pub struct RecordingStream<T> {
    inner: T,
    shutdown: Shutdown,
    writes: Arc<Mutex<Vec<WriteRecord>>>,
}

impl<T> RecordingStream<T> {
    /// Wrap `inner`, observing `shutdown`.
    pub fn new(inner: T, shutdown: Shutdown) -> Self {
        Self { inner, shutdown, writes: Arc::default() }
    }

    /// Shared view of the write log, usable after the stream is consumed.
    pub fn log(&self) -> WriteLog {
        WriteLog { writes: Arc::clone(&self.writes) }
    }
}

/// Read access to a [`RecordingStream`]'s writes.
#[derive(Debug, Clone)]
pub struct WriteLog {
    writes: Arc<Mutex<Vec<WriteRecord>>>,
}

impl WriteLog {
    /// Every write so far.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// All written bytes, concatenated, as text.
    pub fn text(&self) -> String {
        let bytes: Vec<u8> = self.writes().into_iter().flat_map(|w| w.bytes).collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for RecordingStream<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for RecordingStream<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let after_shutdown = this.shutdown.is_triggered();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            this.writes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(WriteRecord { bytes: buf[..*n].to_vec(), after_shutdown });
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Which half of a [`FaultyStream`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every read fails with `ConnectionReset`. Writes are discarded.
    Read,
    /// Every write fails with `BrokenPipe`. Reads never complete.
    Write,
}

/// Stream with no peer whose reads or writes fail.
#[derive(Debug, Clone, Copy)]
pub struct FaultyStream {
    fault: Fault,
}

impl FaultyStream {
    /// Stream failing on `fault`.
    pub fn new(fault: Fault) -> Self {
        Self { fault }
    }
}

impl AsyncRead for FaultyStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.fault {
            Fault::Read => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            ))),
            // Only the session's shutdown signal wakes a reader parked here.
            Fault::Write => Poll::Pending,
        }
    }
}

impl AsyncWrite for FaultyStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.fault {
            Fault::Read => Poll::Ready(Ok(buf.len())),
            Fault::Write => {
                Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")))
            },
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
