use crate::prelude::*;

type Registry = std::sync::Mutex<Subscribers>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    senders: std::collections::BTreeMap<
        u64,
        futures::sync::mpsc::UnboundedSender<crate::viewport::DisplaySize>,
    >,
}

fn lock(registry: &Registry) -> std::sync::MutexGuard<'_, Subscribers> {
    registry
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Fans display size changes out to whoever is currently subscribed. Each
/// session holds its own subscription, so several sessions can share one
/// display.
#[derive(Clone, Default)]
pub struct Notifier {
    registry: std::sync::Arc<Registry>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = futures::sync::mpsc::unbounded();
        let mut subscribers = lock(&self.registry);
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.senders.insert(id, tx);
        log::debug!("display: subscribe({})", id);
        Subscription {
            id,
            registry: std::sync::Arc::downgrade(&self.registry),
            events: rx,
        }
    }

    pub fn notify(&self, size: crate::viewport::DisplaySize) {
        let mut subscribers = lock(&self.registry);
        log::debug!(
            "display: notify({}x{}) to {} subscribers",
            size.width,
            size.height,
            subscribers.senders.len()
        );
        subscribers
            .senders
            .retain(|_, tx| tx.unbounded_send(size).is_ok());
    }

    #[cfg(test)]
    pub fn subscribers(&self) -> usize {
        lock(&self.registry).senders.len()
    }
}

/// Stream of display sizes, deregistered from its notifier when dropped.
pub struct Subscription {
    id: u64,
    registry: std::sync::Weak<Registry>,
    events: futures::sync::mpsc::UnboundedReceiver<
        crate::viewport::DisplaySize,
    >,
}

#[cfg(test)]
impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).senders.remove(&self.id);
            log::debug!("display: unsubscribe({})", self.id);
        }
    }
}

#[must_use = "streams do nothing unless polled"]
impl futures::stream::Stream for Subscription {
    type Item = crate::viewport::DisplaySize;
    type Error = Error;

    fn poll(&mut self) -> futures::Poll<Option<Self::Item>, Self::Error> {
        self.events
            .poll()
            .map_err(|()| Error::DisplaySubscription)
    }
}

/// Watches the local terminal for SIGWINCH and reports the area it now
/// covers.
pub struct TerminalWatcher {
    winches:
        Box<dyn futures::stream::Stream<Item = (), Error = Error> + Send>,
    cell: crate::viewport::CellSize,
}

impl TerminalWatcher {
    pub fn new(cell: crate::viewport::CellSize) -> Self {
        let winches = tokio_signal::unix::Signal::new(
            tokio_signal::unix::libc::SIGWINCH,
        )
        .flatten_stream()
        .map(|_| ())
        .context(crate::error::SigWinchHandler);
        Self {
            winches: Box::new(winches),
            cell,
        }
    }

    pub fn current(&self) -> Result<crate::viewport::DisplaySize> {
        Ok(crate::viewport::DisplaySize::of_window(
            crate::term::Size::get()?,
            crate::term::Size::pixels(),
            self.cell,
        ))
    }
}

#[must_use = "streams do nothing unless polled"]
impl futures::stream::Stream for TerminalWatcher {
    type Item = crate::viewport::DisplaySize;
    type Error = Error;

    fn poll(&mut self) -> futures::Poll<Option<Self::Item>, Self::Error> {
        if futures::try_ready!(self.winches.poll()).is_none() {
            return Ok(futures::Async::Ready(None));
        }
        Ok(futures::Async::Ready(Some(self.current()?)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn display(width: u32, height: u32) -> crate::viewport::DisplaySize {
        crate::viewport::DisplaySize { width, height }
    }

    #[test]
    fn test_notify_subscribers() {
        let notifier = Notifier::new();
        let a = notifier.subscribe();
        let b = notifier.subscribe();
        assert_ne!(a.id(), b.id());
        assert_eq!(notifier.subscribers(), 2);

        notifier.notify(display(800, 400));
        notifier.notify(display(1600, 400));

        let mut a = a.wait();
        assert_eq!(a.next().unwrap().unwrap(), display(800, 400));
        assert_eq!(a.next().unwrap().unwrap(), display(1600, 400));
        let mut b = b.wait();
        assert_eq!(b.next().unwrap().unwrap(), display(800, 400));
        assert_eq!(b.next().unwrap().unwrap(), display(1600, 400));
    }

    #[test]
    fn test_drop_unsubscribes() {
        let notifier = Notifier::new();
        let a = notifier.subscribe();
        let b = notifier.subscribe();
        drop(a);
        assert_eq!(notifier.subscribers(), 1);

        notifier.notify(display(100, 100));
        let mut b = b.wait();
        assert_eq!(b.next().unwrap().unwrap(), display(100, 100));
    }

    #[test]
    fn test_notifier_dropped_first() {
        let notifier = Notifier::new();
        let sub = notifier.subscribe();
        drop(notifier);
        // the sender went away with the notifier, so the stream just ends
        assert!(sub.wait().next().is_none());
    }
}
