use crate::prelude::*;
use std::io::Read as _;

const STDIN: std::os::unix::io::RawFd = 0;
const READ_SIZE: usize = 4096;

struct EventedStdin;

impl std::io::Read for EventedStdin {
    // straight from the fd: std's stdin buffers internally, and anything
    // sitting in that buffer is invisible to `input_waiting`
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = unsafe {
            libc::read(STDIN, buf.as_mut_ptr() as *mut libc::c_void, buf.len())
        };
        if n < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(n as usize)
    }
}

impl mio::Evented for EventedStdin {
    fn register(
        &self,
        poll: &mio::Poll,
        token: mio::Token,
        interest: mio::Ready,
        opts: mio::PollOpt,
    ) -> std::io::Result<()> {
        mio::unix::EventedFd(&STDIN).register(poll, token, interest, opts)
    }

    fn reregister(
        &self,
        poll: &mio::Poll,
        token: mio::Token,
        interest: mio::Ready,
        opts: mio::PollOpt,
    ) -> std::io::Result<()> {
        mio::unix::EventedFd(&STDIN).reregister(poll, token, interest, opts)
    }

    fn deregister(&self, poll: &mio::Poll) -> std::io::Result<()> {
        mio::unix::EventedFd(&STDIN).deregister(poll)
    }
}

// whether a read right now would return immediately (with data, eof, or an
// error) instead of blocking
fn input_waiting() -> std::io::Result<bool> {
    let mut fds = libc::pollfd {
        fd: STDIN,
        events: libc::POLLIN,
        revents: 0,
    };
    let res = unsafe { libc::poll(&mut fds, 1, 0) };
    if res < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(res > 0 && fds.revents != 0)
}

/// Keystrokes from the local terminal, as text. `tokio::io::stdin` does
/// blocking reads on a thread pool, which would keep the runtime alive
/// after the session ends, so readiness is checked through the reactor
/// instead and a read only happens once stdin has something for us.
pub struct Input {
    stdin: tokio::reactor::PollEvented2<EventedStdin>,
    decoder: crate::protocol::TextDecoder,
    buf: Vec<u8>,
}

impl Input {
    pub fn new() -> Self {
        Self {
            stdin: tokio::reactor::PollEvented2::new(EventedStdin),
            decoder: crate::protocol::TextDecoder::new(),
            buf: vec![0; READ_SIZE],
        }
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::new()
    }
}

#[must_use = "streams do nothing unless polled"]
impl futures::stream::Stream for Input {
    type Item = String;
    type Error = Error;

    fn poll(&mut self) -> futures::Poll<Option<Self::Item>, Self::Error> {
        let ready = mio::Ready::readable();
        loop {
            // the reactor only reports new input arriving, not input that
            // is still left over from an earlier read, so check directly
            if input_waiting().context(crate::error::ReadTerminal)? {
                let n = self
                    .stdin
                    .get_mut()
                    .read(&mut self.buf)
                    .context(crate::error::ReadTerminal)?;
                if n == 0 {
                    return Ok(futures::Async::Ready(None));
                }

                // a lone partial character produces no text yet
                let text = self.decoder.decode(&self.buf[..n]);
                if !text.is_empty() {
                    return Ok(futures::Async::Ready(Some(text)));
                }
                continue;
            }

            // cleared before looping back around, so input that shows up
            // after the check above still wakes us
            futures::try_ready!(self
                .stdin
                .poll_read_ready(ready)
                .context(crate::error::ReadTerminal));
            self.stdin
                .clear_read_ready(ready)
                .context(crate::error::ReadTerminal)?;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Pipe {
        write: std::os::unix::io::RawFd,
        saved: std::os::unix::io::RawFd,
    }

    impl Pipe {
        fn onto_stdin() -> Self {
            let mut fds = [0; 2];
            unsafe {
                assert_eq!(libc::pipe(fds.as_mut_ptr()), 0);
                let saved = libc::dup(STDIN);
                assert!(saved >= 0);
                assert_eq!(libc::dup2(fds[0], STDIN), STDIN);
                libc::close(fds[0]);
                Self {
                    write: fds[1],
                    saved,
                }
            }
        }

        fn write(&self, data: &[u8]) {
            let n = unsafe {
                libc::write(
                    self.write,
                    data.as_ptr() as *const libc::c_void,
                    data.len(),
                )
            };
            assert_eq!(n, data.len() as isize);
        }

        fn close_write(&mut self) {
            if self.write >= 0 {
                unsafe { libc::close(self.write) };
                self.write = -1;
            }
        }
    }

    impl Drop for Pipe {
        fn drop(&mut self) {
            self.close_write();
            unsafe {
                libc::dup2(self.saved, STDIN);
                libc::close(self.saved);
            }
        }
    }

    #[test]
    fn test_reads_everything_available() {
        let mut pipe = Pipe::onto_stdin();
        let mut rt = tokio::runtime::current_thread::Runtime::new().unwrap();

        // more than one read's worth, with the writer left open so nothing
        // new ever arrives to wake the reactor
        pipe.write(&vec![b'a'; READ_SIZE + 904]);
        let read_all = futures::future::loop_fn(
            (Input::new(), 0),
            |(input, total)| {
                input.into_future().map_err(|(e, _)| e).map(
                    move |(text, input)| {
                        let total = total + text.map_or(0, |t| t.len());
                        if total >= READ_SIZE + 904 {
                            futures::future::Loop::Break((input, total))
                        } else {
                            futures::future::Loop::Continue((input, total))
                        }
                    },
                )
            },
        );
        let (input, total) = rt
            .block_on(tokio::timer::Timeout::new(
                read_all,
                std::time::Duration::from_secs(5),
            ))
            .unwrap();
        assert_eq!(total, READ_SIZE + 904);

        pipe.close_write();
        let (text, _) = rt
            .block_on(tokio::timer::Timeout::new(
                input.into_future().map_err(|(e, _)| e),
                std::time::Duration::from_secs(5),
            ))
            .unwrap();
        assert_eq!(text, None);
    }
}
