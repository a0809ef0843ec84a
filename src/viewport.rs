use crate::prelude::*;
use std::convert::TryFrom as _;

// calibrated against the font the terminal is rendered with
pub const DEFAULT_CELL_WIDTH: u32 = 9;
pub const DEFAULT_CELL_HEIGHT: u32 = 18;

/// Size of a single glyph cell, in display units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSize {
    width: u32,
    height: u32,
}

impl CellSize {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidCellSize { width, height });
        }
        Ok(Self { width, height })
    }
}

impl Default for CellSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_CELL_WIDTH,
            height: DEFAULT_CELL_HEIGHT,
        }
    }
}

/// Area available for rendering the terminal, in display units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl DisplaySize {
    /// The area covered by a local terminal of the given size, for when the
    /// display we render into is itself a character grid.
    pub fn of_terminal(size: crate::term::Size, cell: CellSize) -> Self {
        Self {
            width: u32::from(size.cols).saturating_mul(cell.width),
            height: u32::from(size.rows).saturating_mul(cell.height),
        }
    }

    /// The area covered by a local terminal window. Terminals that report
    /// their pixel dimensions are measured in pixels, the rest fall back to
    /// their character grid.
    pub fn of_window(
        size: crate::term::Size,
        pixels: Option<(u16, u16)>,
        cell: CellSize,
    ) -> Self {
        match pixels {
            Some((width, height)) => Self {
                width: u32::from(width),
                height: u32::from(height),
            },
            None => Self::of_terminal(size, cell),
        }
    }
}

/// Turns display dimensions into a terminal size by fitting as many whole
/// cells as possible. Never returns a zero dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sizer {
    cell: CellSize,
}

impl Sizer {
    pub fn new(cell: CellSize) -> Self {
        Self { cell }
    }

    pub fn compute(&self, display: DisplaySize) -> crate::term::Size {
        crate::term::Size {
            rows: cells(display.height, self.cell.height),
            cols: cells(display.width, self.cell.width),
        }
    }
}

fn cells(available: u32, cell: u32) -> u16 {
    u16::try_from(available / cell).unwrap_or(u16::MAX).max(1)
}

#[cfg(test)]
mod test {
    use super::*;

    fn sizer() -> Sizer {
        Sizer::new(CellSize::new(9, 18).unwrap())
    }

    #[test]
    fn test_compute() {
        let size = sizer().compute(DisplaySize {
            width: 800,
            height: 400,
        });
        assert_eq!(size, crate::term::Size { rows: 22, cols: 88 });

        let size = sizer().compute(DisplaySize {
            width: 1600,
            height: 400,
        });
        assert_eq!(size, crate::term::Size { rows: 22, cols: 177 });
    }

    #[test]
    fn test_compute_floors() {
        let sizer = sizer();
        for width in (9..2000).step_by(7) {
            for height in (18..1200).step_by(13) {
                let size = sizer.compute(DisplaySize { width, height });
                assert_eq!(u32::from(size.cols), width / 9);
                assert_eq!(u32::from(size.rows), height / 18);
                assert!(size.is_valid());
            }
        }
    }

    #[test]
    fn test_compute_tiny_display() {
        let size = sizer().compute(DisplaySize {
            width: 3,
            height: 0,
        });
        assert_eq!(size, crate::term::Size { rows: 1, cols: 1 });
    }

    #[test]
    fn test_compute_huge_display() {
        let size = Sizer::new(CellSize::new(1, 1).unwrap()).compute(
            DisplaySize {
                width: u32::MAX,
                height: 100,
            },
        );
        assert_eq!(size.cols, u16::MAX);
        assert_eq!(size.rows, 100);
    }

    #[test]
    fn test_invalid_cell_size() {
        assert!(CellSize::new(0, 18).is_err());
        assert!(CellSize::new(9, 0).is_err());
        assert_eq!(CellSize::default(), CellSize::new(9, 18).unwrap());
    }

    #[test]
    fn test_of_terminal_round_trips() {
        let cell = CellSize::default();
        let size = crate::term::Size { rows: 24, cols: 80 };
        let display = DisplaySize::of_terminal(size, cell);
        assert_eq!(display, DisplaySize { width: 720, height: 432 });
        assert_eq!(Sizer::new(cell).compute(display), size);
    }

    #[test]
    fn test_of_window() {
        let size = crate::term::Size { rows: 24, cols: 80 };

        let display =
            DisplaySize::of_window(size, Some((1600, 400)), CellSize::default());
        assert_eq!(display, DisplaySize { width: 1600, height: 400 });
        assert_eq!(
            sizer().compute(display),
            crate::term::Size { rows: 22, cols: 177 }
        );
        // the cell size decides how many cells fit into the same window
        assert_eq!(
            Sizer::new(CellSize::new(8, 16).unwrap()).compute(display),
            crate::term::Size { rows: 25, cols: 200 }
        );

        let display = DisplaySize::of_window(size, None, CellSize::default());
        assert_eq!(display, DisplaySize { width: 720, height: 432 });
        assert_eq!(sizer().compute(display), size);
    }
}
