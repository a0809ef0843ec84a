use crate::prelude::*;
use tokio::io::AsyncWrite as _;

#[derive(serde::Deserialize, Debug, Default)]
pub struct Config {
    #[serde(default)]
    client: crate::config::Client,

    #[serde(default)]
    viewport: crate::config::Viewport,
}

impl crate::config::Config for Config {
    fn merge_args<'a>(
        &mut self,
        matches: &clap::ArgMatches<'a>,
    ) -> Result<()> {
        self.client.merge_args(matches)?;
        self.viewport.merge_args(matches)?;
        Ok(())
    }

    fn run(
        &self,
    ) -> Box<dyn futures::Future<Item = (), Error = Error> + Send> {
        let session = self.client.endpoint().and_then(|endpoint| {
            ConnectSession::new(
                &endpoint,
                &self.client.session_id()?,
                self.viewport.cell()?,
            )
        });
        match session {
            Ok(session) => Box::new(session),
            Err(e) => Box::new(futures::future::err(e)),
        }
    }
}

pub fn cmd<'a, 'b>(app: clap::App<'a, 'b>) -> clap::App<'a, 'b> {
    crate::config::Client::cmd(crate::config::Viewport::cmd(
        app.about("Attach this terminal to a remote session"),
    ))
}

pub fn config(
    config: Option<config::Config>,
) -> Result<Box<dyn crate::config::Config>> {
    let config: Config = if let Some(config) = config {
        config
            .try_into()
            .context(crate::error::CouldntParseConfig)?
    } else {
        Config::default()
    };
    Ok(Box::new(config))
}

type ConnectFuture = Box<
    dyn futures::Future<Item = crate::ws::Connection, Error = Error> + Send,
>;

struct ConnectSession {
    bridge: crate::bridge::Bridge<
        crate::ws::Outbox,
        crate::surface::TerminalSurface,
    >,
    notifier: crate::display::Notifier,
    connecting: Option<ConnectFuture>,
    conn: Option<crate::ws::Connection>,

    input: crate::async_stdin::Input,
    watcher: crate::display::TerminalWatcher,

    stdout: tokio::io::Stdout,
    needs_flush: bool,
}

impl ConnectSession {
    fn new(
        endpoint: &crate::endpoint::Endpoint,
        id: &crate::endpoint::SessionId,
        cell: crate::viewport::CellSize,
    ) -> Result<Self> {
        let watcher = crate::display::TerminalWatcher::new(cell);
        let notifier = crate::display::Notifier::new();

        let mut bridge = crate::bridge::Bridge::new(
            crate::viewport::Sizer::new(cell),
            crate::ws::Outbox::new(),
            crate::surface::TerminalSurface::new(),
        );
        bridge.start(&notifier, endpoint, id, watcher.current()?)?;

        Ok(Self {
            bridge,
            notifier,
            connecting: None,
            conn: None,

            input: crate::async_stdin::Input::new(),
            watcher,

            stdout: tokio::io::stdout(),
            needs_flush: false,
        })
    }

    fn dispatch(&mut self, event: crate::bridge::Event) -> Result<()> {
        match self.bridge.handle(event) {
            Ok(()) => Ok(()),
            Err(e) if e.is_recoverable() => {
                log::warn!("{}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn socket_idle(&mut self) -> bool {
        let queued = self.bridge.channel_mut().transport_mut().queue().len();
        queued == 0
            && self
                .conn
                .as_ref()
                .map_or(true, crate::ws::Connection::is_idle)
    }
}

impl ConnectSession {
    const POLL_FNS:
        &'static [&'static dyn for<'a> Fn(
            &'a mut Self,
        )
            -> component_future::Poll<
            (),
            Error,
        >] = &[
        &Self::poll_connect,
        &Self::poll_read_socket,
        &Self::poll_write_socket,
        &Self::poll_input,
        &Self::poll_winch,
        &Self::poll_display,
        &Self::poll_write_terminal,
        &Self::poll_flush_terminal,
        &Self::poll_exit,
    ];

    fn poll_connect(&mut self) -> component_future::Poll<(), Error> {
        if let Some(fut) = &mut self.connecting {
            let conn = component_future::try_ready!(fut.poll());
            self.connecting = None;
            self.conn = Some(conn);
            self.dispatch(crate::bridge::Event::Opened)?;
            return Ok(component_future::Async::DidWork);
        }

        let url = if let Some(url) =
            self.bridge.channel_mut().transport_mut().take_connect()
        {
            url
        } else {
            return Ok(component_future::Async::NothingToDo);
        };
        let fut = tokio_tungstenite::connect_async(url.clone())
            .map(|(ws, _)| crate::ws::Connection::new(ws))
            .context(crate::error::TransportConnect {
                url: url.to_string(),
            });
        self.connecting = Some(Box::new(fut));
        Ok(component_future::Async::DidWork)
    }

    fn poll_read_socket(&mut self) -> component_future::Poll<(), Error> {
        if self.bridge.is_closed() {
            return Ok(component_future::Async::NothingToDo);
        }
        let msg = if let Some(conn) = &mut self.conn {
            component_future::try_ready!(conn.poll_read())
        } else {
            return Ok(component_future::Async::NothingToDo);
        };

        let event = match msg.map(crate::ws::Frame::from_message) {
            Some(Ok(crate::ws::Frame::Text(frame))) => {
                crate::bridge::Event::Received(frame)
            }
            Some(Ok(crate::ws::Frame::Control)) => {
                return Ok(component_future::Async::DidWork);
            }
            Some(Ok(crate::ws::Frame::Close)) | None => {
                crate::bridge::Event::Closed
            }
            Some(Err(e)) => {
                log::warn!("{}", e);
                return Ok(component_future::Async::DidWork);
            }
        };
        self.dispatch(event)?;
        Ok(component_future::Async::DidWork)
    }

    fn poll_write_socket(&mut self) -> component_future::Poll<(), Error> {
        if let Some(conn) = &mut self.conn {
            conn.poll_write(self.bridge.channel_mut().transport_mut().queue())
        } else {
            Ok(component_future::Async::NothingToDo)
        }
    }

    fn poll_input(&mut self) -> component_future::Poll<(), Error> {
        if self.bridge.is_closed() {
            return Ok(component_future::Async::NothingToDo);
        }

        if let Some(data) = component_future::try_ready!(self.input.poll()) {
            self.dispatch(crate::bridge::Event::UserInput(data))?;
        } else {
            log::info!("end of input, closing session");
            self.bridge.close();
        }
        Ok(component_future::Async::DidWork)
    }

    fn poll_winch(&mut self) -> component_future::Poll<(), Error> {
        if let Some(display) =
            component_future::try_ready!(self.watcher.poll())
        {
            self.notifier.notify(display);
            Ok(component_future::Async::DidWork)
        } else {
            Ok(component_future::Async::NothingToDo)
        }
    }

    fn poll_display(&mut self) -> component_future::Poll<(), Error> {
        let display = if let Some(subscription) =
            self.bridge.subscription_mut()
        {
            component_future::try_ready!(subscription.poll())
        } else {
            return Ok(component_future::Async::NothingToDo);
        };

        if let Some(display) = display {
            self.dispatch(crate::bridge::Event::DisplayResized(display))?;
            Ok(component_future::Async::DidWork)
        } else {
            Ok(component_future::Async::NothingToDo)
        }
    }

    fn poll_write_terminal(&mut self) -> component_future::Poll<(), Error> {
        let to_print = self.bridge.surface_mut().to_print();
        if to_print.is_empty() {
            return Ok(component_future::Async::NothingToDo);
        }

        let (a, b) = to_print.as_slices();
        let buf = if a.is_empty() { b } else { a };
        let n = component_future::try_ready!(self
            .stdout
            .poll_write(buf)
            .context(crate::error::WriteTerminal));
        to_print.drain(..n);
        self.needs_flush = true;
        Ok(component_future::Async::DidWork)
    }

    fn poll_flush_terminal(&mut self) -> component_future::Poll<(), Error> {
        if !self.needs_flush {
            return Ok(component_future::Async::NothingToDo);
        }

        component_future::try_ready!(self
            .stdout
            .poll_flush()
            .context(crate::error::FlushTerminal));
        self.needs_flush = false;
        Ok(component_future::Async::DidWork)
    }

    fn poll_exit(&mut self) -> component_future::Poll<(), Error> {
        // only finish once everything that was going to be shown or sent
        // actually went out
        if !self.bridge.is_closed()
            || !self.bridge.surface_mut().to_print().is_empty()
            || self.needs_flush
            || !self.socket_idle()
        {
            return Ok(component_future::Async::NothingToDo);
        }
        Ok(component_future::Async::Ready(()))
    }
}

#[must_use = "futures do nothing unless polled"]
impl futures::Future for ConnectSession {
    type Item = ();
    type Error = Error;

    fn poll(&mut self) -> futures::Poll<Self::Item, Self::Error> {
        component_future::poll_future(self, Self::POLL_FNS)
    }
}
