use std::io::{self, Read};
use std::time::Duration;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::DapCodec;
use crate::error::CodecError;
use crate::message::Message;

const READ_CHUNK: usize = 4096;

/// Blocking reader producing one [`Message`] per call.
pub struct MessageReader<R> {
    input: R,
    codec: DapCodec,
    buffer: BytesMut,
}

impl<R> MessageReader<R>
where
    R: Read,
{
    pub fn new(input: R) -> Self {
        Self::with_codec(input, DapCodec::new())
    }

    pub fn with_codec(input: R, codec: DapCodec) -> Self {
        Self {
            input,
            codec,
            buffer: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Block until a complete message arrives.
    ///
    /// Returns `Ok(None)` once the input reaches end of stream. A partial
    /// frame left in the buffer at that point is discarded.
    pub fn poll_message(&mut self) -> Result<Option<Message>, CodecError> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(message) = self.codec.decode(&mut self.buffer)? {
                return Ok(Some(message));
            }

            match self.input.read(&mut chunk) {
                Ok(0) => {
                    if !self.buffer.is_empty() {
                        tracing::warn!(
                            remaining = self.buffer.len(),
                            "input closed with a partial message"
                        );
                    }
                    return Ok(None);
                }
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    // read timeout expired with no data available
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(CodecError::Io(e)),
            }
        }
    }
}
