use crate::prelude::*;

/// The socket a channel talks over. Implementations only move frames
/// around, all of the lifecycle bookkeeping lives in `SessionChannel`.
pub trait Transport {
    fn connect(&mut self, url: &url::Url) -> Result<()>;
    fn send(&mut self, frame: String) -> Result<()>;
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Connecting,
    Open,
    Closed,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// One connection to one remote pty. Channels are single use: once closed,
/// a new session needs a new channel.
pub struct SessionChannel<T: Transport> {
    transport: T,
    state: State,
}

impl<T: Transport> SessionChannel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn open(
        &mut self,
        endpoint: &crate::endpoint::Endpoint,
        size: crate::term::Size,
        id: &crate::endpoint::SessionId,
    ) -> Result<()> {
        if self.state != State::Idle {
            return Err(Error::ChannelReused { state: self.state });
        }

        let url = endpoint.url(id, size)?;
        log::info!("channel: connecting to {}", url);
        self.transport.connect(&url)?;
        self.state = State::Connecting;
        Ok(())
    }

    /// Called when the transport finishes connecting. Returns whether this
    /// actually opened the channel.
    pub fn handle_open(&mut self) -> bool {
        if self.state != State::Connecting {
            log::warn!("channel: unexpected open (state: {})", self.state);
            return false;
        }
        log::info!("channel: open");
        self.state = State::Open;
        true
    }

    pub fn send(
        &mut self,
        envelope: &crate::protocol::Envelope,
    ) -> Result<()> {
        if self.state != State::Open {
            return Err(Error::ChannelNotOpen { state: self.state });
        }
        envelope.log("channel: send");
        self.transport.send(envelope.encode()?)
    }

    pub fn receive(&self, frame: &str) -> Result<String> {
        if self.state != State::Open {
            return Err(Error::ChannelNotOpen { state: self.state });
        }
        crate::protocol::Envelope::decode_output(frame)
    }

    /// Called when the transport went away on its own. Returns the state the
    /// channel was in before.
    pub fn handle_close(&mut self) -> State {
        let prev = std::mem::replace(&mut self.state, State::Closed);
        if prev != State::Closed {
            log::info!("channel: closed by peer (was {})", prev);
        }
        prev
    }

    pub fn close(&mut self) {
        match self.state {
            State::Connecting | State::Open => {
                log::info!("channel: closing");
                self.transport.close();
            }
            State::Idle | State::Closed => {}
        }
        self.state = State::Closed;
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
