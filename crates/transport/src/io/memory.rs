//! Channel-backed transport for driving the service from a test thread.

use std::io::{self, Cursor, Read, Write};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use super::DapTransport;

/// One end of a duplex pipe built from two crossbeam channels.
///
/// ```
/// use std::io::{Read, Write};
/// use transport::io::{DapTransport, InMemoryTransport};
///
/// let (client, adapter) = InMemoryTransport::pair();
/// let (_, mut to_adapter) = client.split()?;
/// let (mut from_client, _) = adapter.split()?;
///
/// to_adapter.write_all(b"ping")?;
/// let mut buf = [0u8; 4];
/// from_client.read_exact(&mut buf)?;
/// assert_eq!(&buf, b"ping");
/// # Ok::<(), eyre::Error>(())
/// ```
pub struct InMemoryTransport {
    reader: InMemoryReader,
    writer: InMemoryWriter,
}

impl InMemoryTransport {
    /// `(client, adapter)`: bytes written on one end are read on the other.
    pub fn pair() -> (Self, Self) {
        let (to_adapter, from_client) = crossbeam_channel::unbounded();
        let (to_client, from_adapter) = crossbeam_channel::unbounded();

        let client = Self {
            reader: InMemoryReader::new(from_adapter),
            writer: InMemoryWriter { tx: to_adapter },
        };
        let adapter = Self {
            reader: InMemoryReader::new(from_client),
            writer: InMemoryWriter { tx: to_client },
        };
        (client, adapter)
    }
}

impl DapTransport for InMemoryTransport {
    type Reader = InMemoryReader;
    type Writer = InMemoryWriter;

    fn split(self) -> eyre::Result<(Self::Reader, Self::Writer)> {
        Ok((self.reader, self.writer))
    }
}

/// Yields `WouldBlock` while the peer has written nothing new and end of
/// stream once the peer's writer is gone.
pub struct InMemoryReader {
    pending: Cursor<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl InMemoryReader {
    fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            pending: Cursor::default(),
            rx,
        }
    }

    fn refill(&mut self) -> io::Result<bool> {
        match self.rx.try_recv() {
            Ok(chunk) => {
                self.pending = Cursor::new(chunk);
                Ok(true)
            }
            Err(TryRecvError::Empty) => Err(io::ErrorKind::WouldBlock.into()),
            Err(TryRecvError::Disconnected) => Ok(false),
        }
    }
}

impl Read for InMemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let drained = self.pending.position() as usize >= self.pending.get_ref().len();
        if drained && !self.refill()? {
            return Ok(0);
        }
        self.pending.read(buf)
    }
}

pub struct InMemoryWriter {
    tx: Sender<Vec<u8>>,
}

impl Write for InMemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
