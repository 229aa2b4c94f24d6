//! Byte transports the service can run over.
//!
//! ```
//! use transport::io::{DapTransport, InMemoryTransport};
//! use transport::{Channel, MessageReader};
//!
//! let (_client, adapter) = InMemoryTransport::pair();
//! let (input, output) = adapter.split()?;
//! let _reader = MessageReader::new(input);
//! let _channel = Channel::new(output);
//! # Ok::<(), eyre::Error>(())
//! ```

use std::io::{Read, Write};

mod memory;
mod tcp;

pub use memory::{InMemoryReader, InMemoryTransport, InMemoryWriter};
pub use tcp::TcpTransport;

/// A duplex byte stream that can be pulled apart into independent halves.
///
/// A reader may report `WouldBlock` when it has nothing yet;
/// [`crate::MessageReader`] treats that as "try again".
pub trait DapTransport: Send + 'static {
    type Reader: Read + Send + 'static;
    type Writer: Write + Send + 'static;

    fn split(self) -> eyre::Result<(Self::Reader, Self::Writer)>;
}
