use crate::prelude::*;

use tokio_tungstenite::tungstenite;

pub mod input;
pub mod relay;

type SocketStream = Box<
    dyn futures::Stream<Item = tokio::net::TcpStream, Error = Error> + Send,
>;

/// Accepts websocket connections and starts a relay for each one.
pub struct Server {
    sockets: SocketStream,
    cmd: String,
    args: Vec<String>,
    heartbeat: std::time::Duration,
}

impl Server {
    pub fn bind(
        address: std::net::SocketAddr,
        cmd: &str,
        args: &[String],
        heartbeat: std::time::Duration,
    ) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(&address)
            .context(crate::error::Bind { address })?;
        log::info!("listening on {}", address);
        Ok(Self::new(listener, cmd, args, heartbeat))
    }

    pub fn new(
        listener: tokio::net::TcpListener,
        cmd: &str,
        args: &[String],
        heartbeat: std::time::Duration,
    ) -> Self {
        Self {
            sockets: Box::new(
                listener.incoming().context(crate::error::SocketAccept),
            ),
            cmd: cmd.to_string(),
            args: args.to_vec(),
            heartbeat,
        }
    }

    fn accept(
        &self,
        socket: tokio::net::TcpStream,
    ) -> Box<dyn futures::Future<Item = (), Error = Error> + Send> {
        let peer = socket
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown peer".to_string());
        let path = std::sync::Arc::new(std::sync::Mutex::new(None));
        let cmd = self.cmd.clone();
        let args = self.args.clone();
        let heartbeat = self.heartbeat;

        Box::new(
            tokio_tungstenite::accept_hdr_async(
                socket,
                record_path(std::sync::Arc::clone(&path)),
            )
            .context(crate::error::TransportAccept)
            .and_then(move |ws| {
                let path = path
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .take()
                    .unwrap_or_default();
                match crate::endpoint::Handshake::from_request_path(&path) {
                    Ok(handshake) => {
                        futures::future::Either::A(relay::Relay::new(
                            crate::ws::Connection::new(ws),
                            &handshake,
                            &cmd,
                            &args,
                            heartbeat,
                        ))
                    }
                    Err(e) => {
                        log::warn!("{}: {}", peer, e);
                        futures::future::Either::B(
                            ws.send(tungstenite::Message::Close(None))
                                .map(|_| ())
                                .context(crate::error::TransportError),
                        )
                    }
                }
            }),
        )
    }
}

// the request path is only visible during the handshake, so stash it for
// after
fn record_path<E>(
    slot: std::sync::Arc<std::sync::Mutex<Option<String>>>,
) -> impl FnOnce(
    &tungstenite::handshake::server::Request,
) -> std::result::Result<Option<Vec<(String, String)>>, E> {
    move |request| {
        *slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some(request.path.clone());
        Ok(None)
    }
}

impl Server {
    const POLL_FNS:
        &'static [&'static dyn for<'a> Fn(
            &'a mut Self,
        )
            -> component_future::Poll<
            (),
            Error,
        >] = &[&Self::poll_accept];

    fn poll_accept(&mut self) -> component_future::Poll<(), Error> {
        if let Some(socket) =
            component_future::try_ready!(self.sockets.poll())
        {
            tokio::spawn(self.accept(socket).map_err(|e| {
                log::error!("{}", e);
            }));
            Ok(component_future::Async::DidWork)
        } else {
            Ok(component_future::Async::Ready(()))
        }
    }
}

#[must_use = "futures do nothing unless polled"]
impl futures::Future for Server {
    type Item = ();
    type Error = Error;

    fn poll(&mut self) -> futures::Poll<Self::Item, Self::Error> {
        component_future::poll_future(self, Self::POLL_FNS)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

    fn serve(
        heartbeat: std::time::Duration,
    ) -> (tokio::runtime::Runtime, std::net::SocketAddr) {
        let mut rt = tokio::runtime::Runtime::new().unwrap();
        let listener =
            tokio::net::TcpListener::bind(&"127.0.0.1:0".parse().unwrap())
                .unwrap();
        let address = listener.local_addr().unwrap();
        let server = Server::new(listener, "cat", &[], heartbeat);
        rt.spawn(server.map_err(|e| panic!("{}", e)));
        (rt, address)
    }

    fn connect(
        rt: &mut tokio::runtime::Runtime,
        address: std::net::SocketAddr,
        path: &str,
    ) -> impl futures::Stream<
        Item = tungstenite::Message,
        Error = tungstenite::Error,
    > + futures::Sink<
        SinkItem = tungstenite::Message,
        SinkError = tungstenite::Error,
    > + Send
           + 'static {
        let url =
            url::Url::parse(&format!("ws://{}{}", address, path)).unwrap();
        let (ws, _) = rt
            .block_on(tokio_tungstenite::connect_async(url))
            .unwrap();
        ws
    }

    // reads messages until `done` is satisfied or the server hangs up
    fn read_until<S>(
        rt: &mut tokio::runtime::Runtime,
        ws: S,
        done: fn(&[tungstenite::Message]) -> bool,
    ) -> (Vec<tungstenite::Message>, S)
    where
        S: futures::Stream<Item = tungstenite::Message> + Send + 'static,
        S::Error: std::fmt::Debug + Send + 'static,
    {
        let read = futures::future::loop_fn(
            (ws, vec![]),
            move |(ws, mut msgs)| {
                ws.into_future().map_err(|(e, _)| e).map(move |(msg, ws)| {
                    if let Some(msg) = msg {
                        msgs.push(msg);
                        if !done(&msgs) {
                            return futures::future::Loop::Continue((
                                ws, msgs,
                            ));
                        }
                    }
                    futures::future::Loop::Break((msgs, ws))
                })
            },
        );
        rt.block_on(tokio::timer::Timeout::new(read, TIMEOUT))
            .unwrap()
    }

    fn output(msgs: &[tungstenite::Message]) -> String {
        msgs.iter()
            .filter_map(|msg| match msg {
                tungstenite::Message::Text(frame) => {
                    match crate::protocol::Envelope::decode(frame).unwrap() {
                        crate::protocol::Envelope::Output { data } => {
                            Some(data)
                        }
                        envelope => panic!("unexpected {:?}", envelope),
                    }
                }
                _ => None,
            })
            .collect()
    }

    fn is_close(msg: &tungstenite::Message) -> bool {
        if let tungstenite::Message::Close(_) = msg {
            true
        } else {
            false
        }
    }

    fn cmd(data: &str) -> tungstenite::Message {
        tungstenite::Message::Text(
            crate::protocol::Envelope::cmd(data).encode().unwrap(),
        )
    }

    #[test]
    fn test_relay_echoes_and_closes_on_exit() {
        let (mut rt, address) = serve(std::time::Duration::from_secs(60));
        let ws = connect(
            &mut rt,
            address,
            "/api/v1/ssh/?id=abc&ptyWidth=80&ptyHeight=24",
        );

        let ws = rt.block_on(ws.send(cmd("hello\n"))).unwrap();
        let (msgs, ws) =
            read_until(&mut rt, ws, |msgs| output(msgs).contains("hello"));
        assert!(output(&msgs).contains("hello"));

        // ^D at the start of a line ends cat's input, so it exits
        let ws = rt.block_on(ws.send(cmd("\u{4}"))).unwrap();
        let (msgs, _) =
            read_until(&mut rt, ws, |msgs| msgs.iter().any(is_close));
        assert!(msgs.iter().any(is_close));
    }

    #[test]
    fn test_relay_sends_heartbeats() {
        let (mut rt, address) = serve(std::time::Duration::from_millis(100));
        let ws = connect(&mut rt, address, "/api/v1/ssh/?id=abc");

        let (msgs, _) = read_until(&mut rt, ws, |msgs| {
            msgs.iter()
                .filter(|msg| {
                    if let tungstenite::Message::Ping(_) = msg {
                        true
                    } else {
                        false
                    }
                })
                .count()
                >= 2
        });
        assert!(!msgs.iter().any(is_close));
    }

    #[test]
    fn test_unknown_path_is_closed() {
        let (mut rt, address) = serve(std::time::Duration::from_secs(60));
        let ws = connect(&mut rt, address, "/other");

        let (msgs, _) =
            read_until(&mut rt, ws, |msgs| msgs.iter().any(is_close));
        assert_eq!(msgs.len(), 1);
        assert!(is_close(&msgs[0]));
    }
}
