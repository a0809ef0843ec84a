use crate::prelude::*;

/// Everything the bridge reacts to, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Opened,
    Received(String),
    Closed,
    DisplayResized(crate::viewport::DisplaySize),
    UserInput(String),
}

/// Ties a session channel to a rendering surface: user input goes out as
/// `cmd` envelopes, output comes back in and is written to the surface, and
/// display size changes are turned into `resize` envelopes.
pub struct Bridge<T: crate::channel::Transport, S: crate::surface::Surface> {
    sizer: crate::viewport::Sizer,
    channel: crate::channel::SessionChannel<T>,
    surface: S,
    attached: bool,

    // size the surface should have, kept current even before the channel
    // opens
    viewport: Option<crate::term::Size>,
    // size the remote pty was last told about
    last_sent: Option<crate::term::Size>,

    subscription: Option<crate::display::Subscription>,
}

impl<T: crate::channel::Transport, S: crate::surface::Surface> Bridge<T, S> {
    pub fn new(
        sizer: crate::viewport::Sizer,
        transport: T,
        surface: S,
    ) -> Self {
        Self {
            sizer,
            channel: crate::channel::SessionChannel::new(transport),
            surface,
            attached: false,
            viewport: None,
            last_sent: None,
            subscription: None,
        }
    }

    pub fn start(
        &mut self,
        notifier: &crate::display::Notifier,
        endpoint: &crate::endpoint::Endpoint,
        id: &crate::endpoint::SessionId,
        display: crate::viewport::DisplaySize,
    ) -> Result<()> {
        let size = self.sizer.compute(display);
        log::info!("bridge: starting session {} at {}", id, size);
        self.channel.open(endpoint, size, id)?;
        // the handshake already carries the size
        self.viewport = Some(size);
        self.last_sent = Some(size);
        self.subscription = Some(notifier.subscribe());
        Ok(())
    }

    pub fn handle(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Opened => self.handle_opened(),
            Event::Received(frame) => self.handle_received(&frame),
            Event::Closed => self.handle_closed(),
            Event::DisplayResized(display) => self.handle_resize(display),
            Event::UserInput(data) => self.handle_input(&data),
        }
    }

    fn handle_opened(&mut self) -> Result<()> {
        if !self.channel.handle_open() {
            return Ok(());
        }

        let size = self.viewport.context(crate::error::MissingViewport)?;
        self.surface.open(size)?;
        self.attached = true;

        // the display changed while we were connecting
        if self.last_sent != Some(size) {
            self.send_resize(size)?;
        }
        Ok(())
    }

    fn handle_received(&mut self, frame: &str) -> Result<()> {
        let data = self.channel.receive(frame)?;
        if !self.attached {
            return Err(Error::ChannelNotOpen {
                state: self.channel.state(),
            });
        }
        self.surface.write(&data)
    }

    fn handle_closed(&mut self) -> Result<()> {
        let prev = self.channel.handle_close();
        self.detach();
        if prev == crate::channel::State::Connecting {
            return Err(Error::TransportClosed);
        }
        Ok(())
    }

    fn handle_resize(
        &mut self,
        display: crate::viewport::DisplaySize,
    ) -> Result<()> {
        let size = self.sizer.compute(display);
        match self.channel.state() {
            crate::channel::State::Idle | crate::channel::State::Closed => {
                return Err(Error::ChannelNotOpen {
                    state: self.channel.state(),
                });
            }
            crate::channel::State::Connecting => {
                // picked up once the channel opens
                self.viewport = Some(size);
                return Ok(());
            }
            crate::channel::State::Open => {}
        }

        if self.last_sent == Some(size) {
            return Ok(());
        }
        self.viewport = Some(size);
        self.send_resize(size)?;
        self.surface.resize(size)
    }

    fn handle_input(&mut self, data: &str) -> Result<()> {
        self.channel.send(&crate::protocol::Envelope::cmd(data))
    }

    fn send_resize(&mut self, size: crate::term::Size) -> Result<()> {
        log::debug!("bridge: resize to {}", size);
        self.channel
            .send(&crate::protocol::Envelope::resize(size))?;
        self.last_sent = Some(size);
        Ok(())
    }

    fn detach(&mut self) {
        // the surface keeps whatever it last showed
        self.attached = false;
        self.subscription = None;
    }

    pub fn close(&mut self) {
        self.channel.close();
        self.detach();
    }

    pub fn is_closed(&self) -> bool {
        self.channel.state() == crate::channel::State::Closed
    }

    #[cfg(test)]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    #[cfg(test)]
    pub fn channel(&self) -> &crate::channel::SessionChannel<T> {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut crate::channel::SessionChannel<T> {
        &mut self.channel
    }

    #[cfg(test)]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn subscription_mut(
        &mut self,
    ) -> Option<&mut crate::display::Subscription> {
        self.subscription.as_mut()
    }
}
