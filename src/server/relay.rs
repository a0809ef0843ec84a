use crate::prelude::*;

use tokio_tungstenite::tungstenite;

/// What an incoming frame asks the pty to do.
#[derive(Debug, PartialEq, Eq)]
pub enum Route {
    Input(Vec<u8>),
    Resize(crate::term::Size),
    Ignore,
}

impl Route {
    pub fn from_frame(frame: &str) -> Result<Self> {
        let envelope = crate::protocol::Envelope::decode(frame)?;
        Ok(match envelope {
            crate::protocol::Envelope::Cmd { data } => {
                Self::Input(data.into_bytes())
            }
            crate::protocol::Envelope::Resize { cols, rows } => {
                let size = crate::term::Size { rows, cols };
                if size.is_valid() {
                    Self::Resize(size)
                } else {
                    Self::Ignore
                }
            }
            // only ever sent the other way
            crate::protocol::Envelope::Output { .. } => Self::Ignore,
        })
    }
}

/// Process output that hasn't been sent yet. Everything printed while a
/// frame is being written goes out together in the next one.
#[derive(Debug, Default)]
struct PendingOutput {
    decoder: crate::protocol::TextDecoder,
    data: String,
    discarding: bool,
}

impl PendingOutput {
    fn push(&mut self, bytes: &[u8]) {
        if self.discarding {
            return;
        }
        self.data.push_str(&self.decoder.decode(bytes));
    }

    fn take(&mut self) -> Option<crate::protocol::Envelope> {
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::replace(&mut self.data, String::new());
        Some(crate::protocol::Envelope::output(&data))
    }

    // nobody is listening anymore
    fn discard(&mut self) {
        self.discarding = true;
        self.data.clear();
    }
}

/// Connects one websocket to one freshly spawned pty process, until either
/// side goes away.
pub struct Relay {
    id: String,
    conn: crate::ws::Connection,
    outgoing: std::collections::VecDeque<tungstenite::Message>,
    closed: bool,

    process: tokio_pty_process_stream::Process<super::input::PtyInput>,
    input: futures::sync::mpsc::UnboundedSender<Vec<u8>>,
    output: PendingOutput,
    exited: bool,

    heartbeat: tokio::timer::Interval,
}

impl Relay {
    pub fn new(
        conn: crate::ws::Connection,
        handshake: &crate::endpoint::Handshake,
        cmd: &str,
        args: &[String],
        heartbeat: std::time::Duration,
    ) -> Self {
        let id = format!("{}", uuid::Uuid::new_v4());
        log::info!(
            "{}: new session (id: {}, size: {})",
            id,
            handshake.id.as_ref().map_or("-", String::as_str),
            handshake.size
        );

        let (input, pty_input) = super::input::PtyInput::new();
        let mut process =
            tokio_pty_process_stream::Process::new(cmd, args, pty_input);
        // applied as soon as the pty exists, so the process starts out at
        // the size the client asked for
        process.resize(handshake.size.rows, handshake.size.cols);

        Self {
            id,
            conn,
            outgoing: std::collections::VecDeque::new(),
            closed: false,

            process,
            input,
            output: PendingOutput::default(),
            exited: false,

            heartbeat: tokio::timer::Interval::new_interval(heartbeat),
        }
    }

    fn handle_frame(&mut self, frame: &str) {
        match Route::from_frame(frame) {
            Ok(Route::Input(data)) => {
                log::debug!("{}: input ({} bytes)", self.id, data.len());
                // fails only once the process is gone, which we find out
                // about from the process itself
                let _ = self.input.unbounded_send(data);
            }
            Ok(Route::Resize(size)) => {
                log::debug!("{}: resize({})", self.id, size);
                self.process.resize(size.rows, size.cols);
            }
            Ok(Route::Ignore) => {
                log::debug!("{}: ignoring frame", self.id);
            }
            Err(e) => {
                log::warn!("{}: {}", self.id, e);
            }
        }
    }
}

impl Relay {
    const POLL_FNS:
        &'static [&'static dyn for<'a> Fn(
            &'a mut Self,
        )
            -> component_future::Poll<
            (),
            Error,
        >] = &[
        &Self::poll_read_socket,
        &Self::poll_process,
        &Self::poll_write_socket,
        &Self::poll_heartbeat,
    ];

    fn poll_read_socket(&mut self) -> component_future::Poll<(), Error> {
        let msg = if let Some(msg) =
            component_future::try_ready!(self.conn.poll_read())
        {
            msg
        } else {
            log::info!("{}: disconnect", self.id);
            return Ok(component_future::Async::Ready(()));
        };

        match crate::ws::Frame::from_message(msg) {
            Ok(crate::ws::Frame::Text(frame)) => {
                if !self.closed {
                    self.handle_frame(&frame);
                }
            }
            Ok(crate::ws::Frame::Close) => {
                log::info!("{}: client closed the connection", self.id);
                self.closed = true;
                self.output.discard();
            }
            Ok(crate::ws::Frame::Control) => {}
            Err(e) => {
                log::warn!("{}: {}", self.id, e);
            }
        }
        Ok(component_future::Async::DidWork)
    }

    fn poll_process(&mut self) -> component_future::Poll<(), Error> {
        if self.exited {
            return Ok(component_future::Async::NothingToDo);
        }

        match component_future::try_ready!(self
            .process
            .poll()
            .context(crate::error::Subprocess))
        {
            Some(tokio_pty_process_stream::Event::CommandStart {
                cmd,
                args,
            }) => {
                log::info!("{}: started {} {:?}", self.id, cmd, args);
            }
            Some(tokio_pty_process_stream::Event::Output { data }) => {
                self.output.push(&data);
            }
            Some(tokio_pty_process_stream::Event::CommandExit { status }) => {
                log::info!("{}: command exited ({})", self.id, status);
                self.exited = true;
            }
            Some(tokio_pty_process_stream::Event::Resize { .. }) => {}
            None => {
                self.exited = true;
            }
        }
        Ok(component_future::Async::DidWork)
    }

    fn poll_write_socket(&mut self) -> component_future::Poll<(), Error> {
        if self.conn.is_idle() && self.outgoing.is_empty() {
            if let Some(envelope) = self.output.take() {
                envelope.log(&self.id);
                self.outgoing
                    .push_back(tungstenite::Message::Text(envelope.encode()?));
            } else if self.exited {
                if self.conn.is_closing() || self.closed {
                    return Ok(component_future::Async::Ready(()));
                }
                self.outgoing.push_back(tungstenite::Message::Close(None));
            }
        }

        self.conn.poll_write(&mut self.outgoing)
    }

    fn poll_heartbeat(&mut self) -> component_future::Poll<(), Error> {
        component_future::try_ready!(self
            .heartbeat
            .poll()
            .context(crate::error::Timer));
        if !self.closed {
            self.outgoing.push_back(tungstenite::Message::Ping(vec![]));
        }
        Ok(component_future::Async::DidWork)
    }
}

#[must_use = "futures do nothing unless polled"]
impl futures::Future for Relay {
    type Item = ();
    type Error = Error;

    fn poll(&mut self) -> futures::Poll<Self::Item, Self::Error> {
        component_future::poll_future(self, Self::POLL_FNS)
    }
}
