//! Loopback TCP transport.

use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use eyre::{Context, Result};

use super::DapTransport;

const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// A connected client socket.
///
/// Reads time out after a second with `WouldBlock`, so a serving loop is not
/// parked forever on a silent client.
///
/// ```no_run
/// use transport::io::TcpTransport;
///
/// let transport = TcpTransport::listen(5678)?;
/// # Ok::<(), eyre::Error>(())
/// ```
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Result<Self> {
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .context("setting read timeout")?;
        Ok(Self { stream })
    }

    /// Accept exactly one client on `127.0.0.1:port`.
    pub fn listen(port: u16) -> Result<Self> {
        let address = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let listener =
            TcpListener::bind(address).with_context(|| format!("binding {address}"))?;
        tracing::info!(%address, "waiting for debugging client");

        let (stream, peer) = listener.accept().context("accepting debugging client")?;
        tracing::info!(%peer, "debugging client connected");
        Self::new(stream)
    }
}

impl DapTransport for TcpTransport {
    type Reader = TcpStream;
    type Writer = TcpStream;

    fn split(self) -> Result<(Self::Reader, Self::Writer)> {
        let input = self
            .stream
            .try_clone()
            .context("cloning stream")?;
        Ok((input, self.stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::thread;

    #[test]
    fn both_halves_share_the_socket() -> Result<()> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
        let address = listener.local_addr()?;

        let client = thread::spawn(move || -> std::io::Result<[u8; 5]> {
            let mut stream = TcpStream::connect(address)?;
            stream.write_all(b"hello")?;
            let mut reply = [0u8; 5];
            stream.read_exact(&mut reply)?;
            Ok(reply)
        });

        let (stream, _) = listener.accept()?;
        let (mut input, mut output) = TcpTransport::new(stream)?.split()?;
        let mut buf = [0u8; 5];
        input.read_exact(&mut buf)?;
        assert_eq!(&buf, b"hello");
        output.write_all(b"world")?;

        assert_eq!(client.join().expect("client thread panicked")?, *b"world");
        Ok(())
    }
}
