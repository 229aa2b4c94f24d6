use std::io;

/// Errors framing or unframing DAP messages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("transport I/O")]
    Io(#[from] io::Error),

    #[error("message header is not valid UTF-8")]
    InvalidUtf8,

    #[error("Content-Length is not a number")]
    MalformedContentLength,

    #[error("message header has no Content-Length")]
    MissingContentLength,

    #[error("message body of {size} bytes is over the {max} byte limit")]
    MessageTooLarge { size: usize, max: usize },

    /// The frame was well formed but its body is not a DAP message.
    #[error("decoding message body")]
    JsonDeserialize(#[source] serde_json::Error),

    #[error("encoding message body")]
    JsonSerialize(#[source] serde_json::Error),
}

impl CodecError {
    /// Whether the stream can keep being read after this error.
    ///
    /// Undecodable bodies are consumed from the buffer, so the next frame
    /// still starts at the right place.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::JsonDeserialize(_))
    }
}
