//! `Content-Length` framing for DAP messages.
//!
//! [`DapCodec`] implements the tokio-util `Decoder`/`Encoder` pair. Those
//! traits are plain buffer transformations, so the blocking
//! [`crate::MessageReader`] and [`crate::Channel`] drive the codec without a
//! runtime.

use std::io::Write;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;
use crate::message::{Message, SequencedMessage};

pub(crate) const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

const SEPARATOR: &[u8] = b"\r\n\r\n";

/// ```text
/// Content-Length: <body length>\r\n
/// \r\n
/// <JSON body>
/// ```
///
/// Header field names are matched case-insensitively and fields other than
/// `Content-Length` are ignored.
#[derive(Debug, Clone)]
pub struct DapCodec {
    max_message_size: usize,
}

impl DapCodec {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Bodies longer than `max_message_size` bytes fail with [`CodecError::MessageTooLarge`].
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    /// Byte lengths of the header block (separator included) and body of
    /// the frame at the start of `src`, once the whole header is buffered.
    fn frame_bounds(&self, src: &[u8]) -> Result<Option<(usize, usize)>, CodecError> {
        let Some(separator) = src.windows(SEPARATOR.len()).position(|w| w == SEPARATOR) else {
            return Ok(None);
        };
        let body_length = content_length(&src[..separator])?;
        if body_length > self.max_message_size {
            return Err(CodecError::MessageTooLarge {
                size: body_length,
                max: self.max_message_size,
            });
        }
        Ok(Some((separator + SEPARATOR.len(), body_length)))
    }
}

impl Default for DapCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn content_length(header: &[u8]) -> Result<usize, CodecError> {
    let header = std::str::from_utf8(header).map_err(|_| CodecError::InvalidUtf8)?;
    let value = header
        .split("\r\n")
        .filter_map(|field| field.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| value.trim())
        .ok_or(CodecError::MissingContentLength)?;
    value
        .parse()
        .map_err(|_| CodecError::MalformedContentLength)
}

impl Decoder for DapCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some((header_length, body_length)) = self.frame_bounds(src)? else {
            return Ok(None);
        };
        let frame_length = header_length + body_length;
        if src.len() < frame_length {
            src.reserve(frame_length - src.len());
            return Ok(None);
        }

        // the frame is consumed even if its body turns out not to parse
        src.advance(header_length);
        let body = src.split_to(body_length);
        tracing::trace!(length = body_length, "decoded frame");
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(CodecError::JsonDeserialize)
    }
}

impl<'a> Encoder<&'a SequencedMessage> for DapCodec {
    type Error = CodecError;

    fn encode(
        &mut self,
        item: &'a SequencedMessage,
        dst: &mut BytesMut,
    ) -> Result<(), Self::Error> {
        let body = serde_json::to_vec(item).map_err(CodecError::JsonSerialize)?;
        let mut writer = dst.writer();
        write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
        writer.write_all(&body)?;
        Ok(())
    }
}
