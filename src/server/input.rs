use crate::prelude::*;

/// Feeds bytes received over the websocket into a pty process. The process
/// wants something it can read from, so this adapts the receiving half of an
/// unbounded channel into an `AsyncRead` that reports end of file once
/// every sender is gone.
pub struct PtyInput {
    rx: futures::sync::mpsc::UnboundedReceiver<Vec<u8>>,
    pending: std::collections::VecDeque<u8>,
}

impl PtyInput {
    pub fn new() -> (futures::sync::mpsc::UnboundedSender<Vec<u8>>, Self) {
        let (tx, rx) = futures::sync::mpsc::unbounded();
        (
            tx,
            Self {
                rx,
                pending: std::collections::VecDeque::new(),
            },
        )
    }
}

impl std::io::Read for PtyInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.pending.is_empty() {
            match self.rx.poll() {
                Ok(futures::Async::Ready(Some(bytes))) => {
                    self.pending.extend(bytes);
                }
                Ok(futures::Async::Ready(None)) | Err(()) => return Ok(0),
                Ok(futures::Async::NotReady) => {
                    return Err(std::io::ErrorKind::WouldBlock.into())
                }
            }
        }

        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl tokio::io::AsyncRead for PtyInput {}
