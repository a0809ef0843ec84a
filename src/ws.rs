use crate::prelude::*;

use tokio_tungstenite::tungstenite;

type MessageSink = Box<
    dyn futures::Sink<SinkItem = tungstenite::Message, SinkError = Error>
        + Send,
>;
type MessageStream = Box<
    dyn futures::Stream<Item = tungstenite::Message, Error = Error> + Send,
>;

/// The transport handed to a `SessionChannel` by the socket-driving
/// futures. It records what the channel asked for, and the owning future
/// carries it out against the real websocket the next time it is polled.
#[derive(Debug, Default)]
pub struct Outbox {
    connect: Option<url::Url>,
    queue: std::collections::VecDeque<tungstenite::Message>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_connect(&mut self) -> Option<url::Url> {
        self.connect.take()
    }

    pub fn queue(
        &mut self,
    ) -> &mut std::collections::VecDeque<tungstenite::Message> {
        &mut self.queue
    }
}

impl crate::channel::Transport for Outbox {
    fn connect(&mut self, url: &url::Url) -> Result<()> {
        self.connect = Some(url.clone());
        Ok(())
    }

    fn send(&mut self, frame: String) -> Result<()> {
        self.queue.push_back(tungstenite::Message::Text(frame));
        Ok(())
    }

    fn close(&mut self) {
        self.queue.push_back(tungstenite::Message::Close(None));
    }
}

/// What a websocket message means to us.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close,
    Control,
}

impl Frame {
    pub fn from_message(msg: tungstenite::Message) -> Result<Self> {
        match msg {
            tungstenite::Message::Text(text) => Ok(Self::Text(text)),
            tungstenite::Message::Binary(bytes) => String::from_utf8(bytes)
                .map(Self::Text)
                .context(crate::error::InvalidFrameEncoding),
            tungstenite::Message::Close(_) => Ok(Self::Close),
            // tungstenite answers pings itself
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => {
                Ok(Self::Control)
            }
        }
    }
}

enum SenderState {
    Temporary,
    Connected(MessageSink),
    Sending(
        Box<dyn futures::Future<Item = MessageSink, Error = Error> + Send>,
    ),
    Flushing(
        Box<dyn futures::Future<Item = MessageSink, Error = Error> + Send>,
    ),
}

/// An established websocket, split so that reads can continue while a
/// write is in flight.
pub struct Connection {
    sender: SenderState,
    stream: MessageStream,
    closing: bool,
}

impl Connection {
    pub fn new<S>(ws: tokio_tungstenite::WebSocketStream<S>) -> Self
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + 'static,
    {
        let (sink, stream) = ws.split();
        Self {
            sender: SenderState::Connected(Box::new(
                sink.sink_map_err(|e| Error::TransportError { source: e }),
            )),
            stream: Box::new(stream.context(crate::error::TransportError)),
            closing: false,
        }
    }

    pub fn is_idle(&self) -> bool {
        match self.sender {
            SenderState::Connected(_) => true,
            _ => false,
        }
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub fn poll_read(
        &mut self,
    ) -> futures::Poll<Option<tungstenite::Message>, Error> {
        self.stream.poll()
    }

    /// Moves the next queued message onto the socket. Messages are sent
    /// one at a time, each flushed before the next one starts.
    pub fn poll_write(
        &mut self,
        queue: &mut std::collections::VecDeque<tungstenite::Message>,
    ) -> component_future::Poll<(), Error> {
        match &mut self.sender {
            SenderState::Temporary => unreachable!(),
            SenderState::Connected(_) => {
                if self.closing {
                    queue.clear();
                    return Ok(component_future::Async::NothingToDo);
                }
                let msg = if let Some(msg) = queue.pop_front() {
                    msg
                } else {
                    return Ok(component_future::Async::NothingToDo);
                };
                if let tungstenite::Message::Close(_) = msg {
                    self.closing = true;
                }
                let fut = match std::mem::replace(
                    &mut self.sender,
                    SenderState::Temporary,
                ) {
                    SenderState::Connected(sink) => sink.send(msg),
                    _ => unreachable!(),
                };
                self.sender = SenderState::Sending(Box::new(fut));
                Ok(component_future::Async::DidWork)
            }
            SenderState::Sending(fut) => {
                let sink = component_future::try_ready!(fut.poll());
                self.sender = SenderState::Flushing(Box::new(sink.flush()));
                Ok(component_future::Async::DidWork)
            }
            SenderState::Flushing(fut) => {
                let sink = component_future::try_ready!(fut.poll());
                self.sender = SenderState::Connected(Box::new(sink));
                Ok(component_future::Async::DidWork)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::channel::Transport as _;

    #[test]
    fn test_outbox() {
        let mut outbox = Outbox::new();
        assert!(outbox.take_connect().is_none());

        let url = url::Url::parse("ws://example.com/api/v1/ssh/?id=abc")
            .unwrap();
        outbox.connect(&url).unwrap();
        assert_eq!(outbox.take_connect(), Some(url));
        assert!(outbox.take_connect().is_none());

        outbox.send("a".to_string()).unwrap();
        outbox.send("b".to_string()).unwrap();
        outbox.close();
        let queued: Vec<_> = outbox.queue().drain(..).collect();
        assert_eq!(
            queued,
            vec![
                tungstenite::Message::Text("a".to_string()),
                tungstenite::Message::Text("b".to_string()),
                tungstenite::Message::Close(None),
            ]
        );
    }

    #[test]
    fn test_connection_stops_sending_after_close() {
        let mut rt = tokio::runtime::Runtime::new().unwrap();
        let listener =
            tokio::net::TcpListener::bind(&"127.0.0.1:0".parse().unwrap())
                .unwrap();
        let address = listener.local_addr().unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        rt.spawn(
            listener
                .incoming()
                .into_future()
                .map_err(|(e, _)| e.to_string())
                .and_then(|(socket, _)| {
                    tokio_tungstenite::accept_async(socket.unwrap())
                        .map_err(|e| e.to_string())
                })
                .and_then(|ws| {
                    ws.map_err(|e| e.to_string())
                        .take_while(|msg| {
                            if let tungstenite::Message::Close(_) = msg {
                                Ok(false)
                            } else {
                                Ok(true)
                            }
                        })
                        .collect()
                })
                .then(move |res| {
                    tx.send(res).unwrap();
                    Ok(())
                }),
        );

        let url = url::Url::parse(&format!("ws://{}/", address)).unwrap();
        let (ws, _) = rt
            .block_on(tokio_tungstenite::connect_async(url))
            .unwrap();
        let mut state = Some((
            Connection::new(ws),
            vec![
                tungstenite::Message::Text("a".to_string()),
                tungstenite::Message::Close(None),
                tungstenite::Message::Text("dropped".to_string()),
            ]
            .into_iter()
            .collect::<std::collections::VecDeque<_>>(),
        ));
        let (conn, queue) = rt
            .block_on(futures::future::poll_fn(move || loop {
                let (conn, queue) = state.as_mut().unwrap();
                match conn.poll_write(queue)? {
                    component_future::Async::DidWork => {}
                    component_future::Async::NotReady => {
                        return Ok(futures::Async::NotReady)
                    }
                    component_future::Async::Ready(())
                    | component_future::Async::NothingToDo => {
                        return Ok::<_, Error>(futures::Async::Ready(
                            state.take().unwrap(),
                        ))
                    }
                }
            }))
            .unwrap();
        assert!(conn.is_idle());
        assert!(conn.is_closing());
        assert!(queue.is_empty());

        let received = rx
            .recv_timeout(std::time::Duration::from_secs(10))
            .unwrap()
            .unwrap();
        assert_eq!(
            received,
            vec![tungstenite::Message::Text("a".to_string())]
        );
    }

    #[test]
    fn test_frame() {
        assert_eq!(
            Frame::from_message(tungstenite::Message::Text("x".to_string()))
                .unwrap(),
            Frame::Text("x".to_string())
        );
        assert_eq!(
            Frame::from_message(tungstenite::Message::Binary(
                b"{\"data\":\"y\"}".to_vec()
            ))
            .unwrap(),
            Frame::Text("{\"data\":\"y\"}".to_string())
        );
        assert_eq!(
            Frame::from_message(tungstenite::Message::Ping(vec![1])).unwrap(),
            Frame::Control
        );
        assert_eq!(
            Frame::from_message(tungstenite::Message::Close(None)).unwrap(),
            Frame::Close
        );
        match Frame::from_message(tungstenite::Message::Binary(vec![0xff])) {
            Err(e @ Error::InvalidFrameEncoding { .. }) => {
                assert!(e.is_recoverable())
            }
            res => panic!("unexpected result: {:?}", res),
        }
    }
}
