//! The outbound message channel.
//!
//! Sequence numbers belong to the channel: handlers build
//! [`OutgoingMessage`]s and the channel stamps each one as it is written.

use std::io::Write;

use bytes::BytesMut;
use tokio_util::codec::Encoder;

use crate::codec::DapCodec;
use crate::error::CodecError;
use crate::message::{OutgoingMessage, Seq, SequencedMessage};

/// Anything that can deliver outbound DAP messages to the client.
pub trait MessageSink {
    /// Send `message`, returning the sequence number it was sent with.
    fn send(&mut self, message: OutgoingMessage) -> Result<Seq, CodecError>;

    /// Restart outbound numbering from zero.
    fn reset_sequence(&mut self);
}

/// A [`MessageSink`] writing Content-Length framed messages to a byte stream.
pub struct Channel<W> {
    output: W,
    codec: DapCodec,
    buffer: BytesMut,
    sequence_number: Seq,
}

impl<W> Channel<W>
where
    W: Write,
{
    pub fn new(output: W) -> Self {
        Self::with_codec(output, DapCodec::new())
    }

    pub fn with_codec(output: W, codec: DapCodec) -> Self {
        Self {
            output,
            codec,
            buffer: BytesMut::new(),
            sequence_number: 0,
        }
    }

    /// The sequence number the next message will be sent with.
    pub fn next_sequence(&self) -> Seq {
        self.sequence_number
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

impl<W> MessageSink for Channel<W>
where
    W: Write,
{
    fn send(&mut self, message: OutgoingMessage) -> Result<Seq, CodecError> {
        let seq = self.sequence_number;
        let sequenced = SequencedMessage { seq, message };

        self.buffer.clear();
        self.codec.encode(&sequenced, &mut self.buffer)?;
        self.output.write_all(&self.buffer)?;
        self.output.flush()?;

        tracing::debug!(seq, message = ?sequenced.message, "sent message");
        // only a delivered message consumes a number
        self.sequence_number += 1;
        Ok(seq)
    }

    fn reset_sequence(&mut self) {
        self.sequence_number = 0;
    }
}

impl<S> MessageSink for &mut S
where
    S: MessageSink + ?Sized,
{
    fn send(&mut self, message: OutgoingMessage) -> Result<Seq, CodecError> {
        (**self).send(message)
    }

    fn reset_sequence(&mut self) {
        (**self).reset_sequence()
    }
}
