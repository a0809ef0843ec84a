use crate::prelude::*;

const CLEAR: &[u8] = b"\x1b[H\x1b[J";

/// Whatever renders the remote terminal. Input from the user doesn't come
/// through here, it reaches the bridge as events.
pub trait Surface {
    fn open(&mut self, size: crate::term::Size) -> Result<()>;
    fn write(&mut self, data: &str) -> Result<()>;
    fn resize(&mut self, size: crate::term::Size) -> Result<()>;
}

/// Renders into the local terminal. Bytes are queued rather than written
/// directly so the session can push them to stdout without blocking, and a
/// vt100 screen is kept alongside so the picture can be redrawn when the
/// size changes.
pub struct TerminalSurface {
    parser: vt100::Parser,
    raw: bool,
    raw_screen: Option<crossterm::screen::RawScreen>,
    size: Option<crate::term::Size>,
    to_print: std::collections::VecDeque<u8>,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self::with_raw_mode(true)
    }

    fn with_raw_mode(raw: bool) -> Self {
        Self {
            parser: vt100::Parser::default(),
            raw,
            raw_screen: None,
            size: None,
            to_print: std::collections::VecDeque::new(),
        }
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.size.is_some()
    }

    #[cfg(test)]
    pub fn size(&self) -> Option<crate::term::Size> {
        self.size
    }

    #[cfg(test)]
    pub fn screen(&self) -> &vt100::Screen {
        self.parser.screen()
    }

    pub fn to_print(&mut self) -> &mut std::collections::VecDeque<u8> {
        &mut self.to_print
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for TerminalSurface {
    fn open(&mut self, size: crate::term::Size) -> Result<()> {
        if self.raw && self.raw_screen.is_none() {
            self.raw_screen = Some(
                crossterm::screen::RawScreen::into_raw_mode()
                    .context(crate::error::ToRawMode)?,
            );
        }
        self.parser.set_size(size.rows, size.cols);
        self.size = Some(size);
        self.to_print.extend(CLEAR);
        Ok(())
    }

    fn write(&mut self, data: &str) -> Result<()> {
        self.parser.process(data.as_bytes());
        self.to_print.extend(data.as_bytes());
        Ok(())
    }

    fn resize(&mut self, size: crate::term::Size) -> Result<()> {
        if self.size == Some(size) {
            return Ok(());
        }
        self.parser.set_size(size.rows, size.cols);
        self.size = Some(size);

        // whatever is on the real terminal now was laid out for the old
        // size, so draw it again from our copy
        self.to_print.extend(CLEAR);
        self.to_print
            .extend(self.parser.screen().contents_formatted());
        Ok(())
    }
}
