//! Contract for the virtual channel transport underneath the endpoint.
//!
//! The outer RDP multiplexer is expected to hand out reliable, in-order,
//! message-oriented byte pipes; this module only describes the surface the
//! endpoint consumes.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
pub use ironrdp_pdu::gcc::ChannelName;
use tracing::warn;

const READ_BUFFER_SIZE: usize = 4096;

/// Result of a single message read from the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// One complete message, `0..len` bytes of the caller's buffer.
    Data(usize),
    /// The pending message does not fit in the caller's buffer; `required`
    /// bytes are needed.
    BufferTooSmall { required: usize },
    /// The peer closed the channel.
    Eof,
}

/// A full-duplex virtual channel obtained from a [`ChannelManager`].
///
/// Reads and writes may be issued concurrently from different tasks;
/// implementations serialize internally as needed.
#[async_trait]
pub trait VirtualChannel: Send + Sync {
    /// Reads one complete message into `buf`.
    ///
    /// A [`ReadOutcome::BufferTooSmall`] return must leave the message
    /// pending, so that a retry with a larger buffer receives it in full.
    async fn read(&self, buf: &mut [u8]) -> io::Result<ReadOutcome>;

    /// Writes one message. Delivery is fire-and-forget.
    async fn write_all(&self, data: &[u8]) -> io::Result<()>;

    /// Closes the channel and unblocks any read in flight. Idempotent.
    fn close(&self);
}

/// Opens virtual channels by name.
pub trait ChannelManager: Send + Sync {
    /// Returns `None` when the channel cannot be opened (for instance when
    /// the client did not join it).
    fn open(&self, name: ChannelName) -> Option<Arc<dyn VirtualChannel>>;
}

/// Message-framed read loop helper: owns the receive buffer and retries a
/// too-small read once after growing.
pub(crate) struct FramedReader {
    channel: Arc<dyn VirtualChannel>,
    buf: Vec<u8>,
}

impl FramedReader {
    pub(crate) fn new(channel: Arc<dyn VirtualChannel>) -> Self {
        Self {
            channel,
            buf: vec![0; READ_BUFFER_SIZE],
        }
    }

    /// Returns the next message, or `None` on EOF.
    pub(crate) async fn recv(&mut self) -> io::Result<Option<&[u8]>> {
        let len = match self.channel.read(&mut self.buf).await? {
            ReadOutcome::Data(len) => len,
            ReadOutcome::Eof => return Ok(None),
            ReadOutcome::BufferTooSmall { required } => {
                self.buf.resize(required, 0);

                match self.channel.read(&mut self.buf).await? {
                    ReadOutcome::Data(len) => len,
                    ReadOutcome::Eof => return Ok(None),
                    ReadOutcome::BufferTooSmall { required } => {
                        warn!(required, "channel read failed again after growing the buffer");
                        return Err(io::Error::other("channel kept rejecting the grown read buffer"));
                    }
                }
            }
        };

        if len > self.buf.len() {
            return Err(io::Error::other("channel reported more bytes than the buffer holds"));
        }

        Ok(Some(&self.buf[..len]))
    }
}
