//! The protocol front: answers session-independent requests and forwards the
//! rest to the [`Session`].

use std::io::Read;
use std::net::TcpStream;

use config::Config;
use engine::Engine;
use eyre::WrapErr;
use serde::Serialize;
use transport::{
    Channel, DapCodec, DapTransport, Message, MessageReader, MessageSink, OutgoingEvent,
    OutgoingResponse, Request, TcpTransport,
};

use crate::protocol::{Capabilities, ExitedEventBody, Thread, ThreadsResponseBody};
use crate::session::Session;

/// Exit code reported in the `exited` event after a disconnect
const DISCONNECT_EXIT_CODE: i64 = 1;

/// Split `transport` into a reader and channel using the configured message size limit.
pub fn open_transport<T: DapTransport>(
    transport: T,
    config: &Config,
) -> eyre::Result<(MessageReader<T::Reader>, Channel<T::Writer>)> {
    let (input, output) = transport.split().wrap_err("splitting transport")?;
    let codec = DapCodec::with_max_size(config.max_message_size);
    Ok((
        MessageReader::with_codec(input, codec.clone()),
        Channel::with_codec(output, codec),
    ))
}

/// Wait for a client on the configured port.
pub fn accept_client(
    config: &Config,
) -> eyre::Result<(MessageReader<TcpStream>, Channel<TcpStream>)> {
    let transport = TcpTransport::listen(config.port)?;
    open_transport(transport, config)
}

pub struct DapService<E, S> {
    session: Session<E, S>,
}

impl<E, S> DapService<E, S>
where
    E: Engine,
    S: MessageSink,
{
    pub fn new(session: Session<E, S>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session<E, S> {
        &self.session
    }

    /// The session, for reporting engine activity.
    pub fn session_mut(&mut self) -> &mut Session<E, S> {
        &mut self.session
    }

    pub fn into_session(self) -> Session<E, S> {
        self.session
    }

    /// Handle inbound messages until `reader` reaches end of input.
    pub fn serve<R: Read>(&mut self, reader: &mut MessageReader<R>) -> eyre::Result<()> {
        loop {
            match reader.poll_message() {
                Ok(Some(message)) => self.handle_message(message)?,
                Ok(None) => {
                    tracing::info!("client closed the connection");
                    return Ok(());
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "dropping unparsable message");
                }
                Err(e) => return Err(e).wrap_err("reading from client"),
            }
        }
    }

    pub fn handle_message(&mut self, message: Message) -> eyre::Result<()> {
        match message {
            Message::Request(request) => self.handle_request(&request),
            Message::Response(response) => {
                tracing::debug!(command = %response.command, "ignoring response from client");
                Ok(())
            }
            Message::Event(event) => {
                tracing::debug!(event = %event.event, "ignoring event from client");
                Ok(())
            }
        }
    }

    #[tracing::instrument(
        skip(self, request),
        fields(command = %request.command, seq = request.seq),
        level = "debug"
    )]
    pub fn handle_request(&mut self, request: &Request) -> eyre::Result<()> {
        tracing::debug!("received request");
        match request.command.as_str() {
            "initialize" => {
                self.respond(
                    request,
                    Capabilities {
                        supports_configuration_done_request: true,
                    },
                )?;
                self.send_event("initialized", serde_json::json!({}))?;
                self.session.init();
            }
            "attach" | "configurationDone" | "enableNetworking" => {
                self.respond(request, serde_json::json!({}))?;
            }
            "threads" => {
                let thread = Thread {
                    id: self.session.thread_id(),
                    name: self.session.config().thread_name.clone(),
                };
                self.respond(
                    request,
                    ThreadsResponseBody {
                        threads: vec![thread],
                    },
                )?;
            }
            "disconnect" => {
                self.session.handle_request(request)?;
                self.session.channel_mut().reset_sequence();
                self.send_event(
                    "exited",
                    ExitedEventBody {
                        exit_code: DISCONNECT_EXIT_CODE,
                    },
                )?;
            }
            _ => {
                if !self.session.handle_request(request)? {
                    tracing::warn!("unsupported command");
                    self.session
                        .channel_mut()
                        .send(
                            OutgoingResponse::failure(
                                request,
                                Some("unsupported command".to_string()),
                            )
                            .into(),
                        )
                        .wrap_err("sending unsupported command response")?;
                }
            }
        }
        Ok(())
    }

    fn respond(&mut self, request: &Request, body: impl Serialize) -> eyre::Result<()> {
        let body = serde_json::to_value(body).wrap_err("serialising response body")?;
        self.session
            .channel_mut()
            .send(OutgoingResponse::success(request, body).into())
            .wrap_err_with(|| format!("sending {} response", request.command))?;
        Ok(())
    }

    fn send_event(&mut self, event: &str, body: impl Serialize) -> eyre::Result<()> {
        let body = serde_json::to_value(body).wrap_err("serialising event body")?;
        self.session
            .channel_mut()
            .send(OutgoingEvent::new(event, body).into())
            .wrap_err_with(|| format!("sending {event} event"))?;
        Ok(())
    }
}
