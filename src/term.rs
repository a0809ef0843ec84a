use crate::prelude::*;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct Size {
    pub rows: u16,
    pub cols: u16,
}

impl Size {
    pub fn get() -> Result<Self> {
        let (cols, rows) = crossterm::terminal::size()
            .context(crate::error::GetTerminalSize)?;
        Ok(Self { rows, cols })
    }

    /// Pixel dimensions of the terminal window as (width, height), if the
    /// terminal reports them.
    pub fn pixels() -> Option<(u16, u16)> {
        let mut ws = libc::winsize {
            ws_row: 0,
            ws_col: 0,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        let res = unsafe {
            libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws)
        };
        if res < 0 || ws.ws_xpixel == 0 || ws.ws_ypixel == 0 {
            return None;
        }
        Some((ws.ws_xpixel, ws.ws_ypixel))
    }

    pub fn is_valid(self) -> bool {
        self.rows > 0 && self.cols > 0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&format!("{}x{}", self.cols, self.rows), f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Size { rows: 24, cols: 80 }.to_string(), "80x24");
    }

    #[test]
    fn test_is_valid() {
        assert!(Size { rows: 1, cols: 1 }.is_valid());
        assert!(!Size { rows: 0, cols: 80 }.is_valid());
        assert!(!Size { rows: 24, cols: 0 }.is_valid());
    }
}
