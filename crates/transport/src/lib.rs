//! Wire side of the script debug bridge.
//!
//! Inbound bytes become [`Message`]s through [`MessageReader`]. Outbound
//! responses and events get their sequence numbers from a [`Channel`]. What
//! a request means is decided by the `debugger` crate.
mod channel;
mod codec;
mod error;
pub mod io;
mod message;
mod reader;

pub mod testing;

pub use channel::{Channel, MessageSink};
pub use codec::DapCodec;
pub use error::CodecError;
pub use io::{DapTransport, InMemoryTransport, TcpTransport};
pub use message::{
    Event, Message, OutgoingEvent, OutgoingMessage, OutgoingResponse, Request, Response, Seq,
    SequencedMessage,
};
pub use reader::MessageReader;
