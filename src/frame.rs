//! The canonical 8x8 grid type shared by every pipeline stage.
//!
//! # Examples
//!
//! ```
//! # use doorway_core::frame::Grid;
//! let grid = Grid::filled(22.0_f32);
//! assert_eq!(grid.get(3, 4), 22.0);
//! ```

use std::ops::{Index, IndexMut};

use crate::consts::{GRID_COLS, GRID_ROWS};

/// A single address into the sensor grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Row index, `0..GRID_ROWS`.
    pub row: usize,
    /// Column index, `0..GRID_COLS`. The column axis is the traversal axis.
    pub col: usize,
}

impl Cell {
    /// Creates a new [`Cell`].
    #[must_use]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Chebyshev (chessboard) distance to another cell.
    #[must_use]
    pub fn chebyshev_distance(self, other: Self) -> usize {
        let dr = self.row.abs_diff(other.row);
        let dc = self.col.abs_diff(other.col);
        dr.max(dc)
    }

    /// The 8-connected neighbors of this cell that lie within the grid.
    pub fn neighbors_8(self) -> impl Iterator<Item = Cell> {
        let Cell { row, col } = self;
        (-1i32..=1).flat_map(move |dr| {
            (-1i32..=1).filter_map(move |dc| {
                if dr == 0 && dc == 0 {
                    return None;
                }
                let nr = row as i32 + dr;
                let nc = col as i32 + dc;
                if nr < 0 || nc < 0 || nr as usize >= GRID_ROWS || nc as usize >= GRID_COLS {
                    return None;
                }
                Some(Cell::new(nr as usize, nc as usize))
            })
        })
    }
}

/// A fixed-size 8x8 grid, used for raw frames, backgrounds, delta matrices,
/// and foreground masks.
///
/// See [the module-level documentation](self) for details.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid<T>([[T; GRID_COLS]; GRID_ROWS]);

impl<T: Copy> Grid<T> {
    /// Creates a grid with every cell set to `value`.
    #[must_use]
    pub fn filled(value: T) -> Self {
        Self([[value; GRID_COLS]; GRID_ROWS])
    }

    /// Returns the value at `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `col` is out of range.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.0[row][col]
    }

    /// Sets the value at `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `col` is out of range.
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.0[row][col] = value;
    }

    /// Builds a grid from a per-cell function, calling it exactly once per
    /// cell in row-major order.
    pub fn from_fn(mut f: impl FnMut(Cell) -> T) -> Self {
        Self(std::array::from_fn(|row| {
            std::array::from_fn(|col| f(Cell::new(row, col)))
        }))
    }

    /// Maps every cell through `f`, producing a grid of a possibly different
    /// element type.
    pub fn map<U: Copy>(&self, mut f: impl FnMut(T) -> U) -> Grid<U> {
        Grid::from_fn(|cell| f(self.get(cell.row, cell.col)))
    }

    /// Iterates over every cell along with its coordinates, in row-major
    /// order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (Cell, T)> + '_ {
        (0..GRID_ROWS)
            .flat_map(|row| (0..GRID_COLS).map(move |col| Cell::new(row, col)))
            .map(move |cell| (cell, self.get(cell.row, cell.col)))
    }
}

impl<T> Index<Cell> for Grid<T> {
    type Output = T;

    fn index(&self, cell: Cell) -> &T {
        &self.0[cell.row][cell.col]
    }
}

impl<T> IndexMut<Cell> for Grid<T> {
    fn index_mut(&mut self, cell: Cell) -> &mut T {
        &mut self.0[cell.row][cell.col]
    }
}

impl Grid<f32> {
    /// Builds a grid from a row-major array of values, e.g. as read off a
    /// sensor driver.
    #[must_use]
    pub fn from_rows(rows: [[f32; GRID_COLS]; GRID_ROWS]) -> Self {
        Self(rows)
    }

    /// `true` if every cell holds a finite value.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.0.iter().flatten().all(|v| v.is_finite())
    }

    /// The largest value across the grid.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.0.iter().flatten().copied().fold(f32::MIN, f32::max)
    }

    /// Cell-wise subtraction.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        Grid::from_fn(|cell| self[cell] - other[cell])
    }

    /// Serializes the grid as 64 row-major, little-endian `f64` values, with
    /// no header. This is the persisted background file format.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; GRID_CELLS_BYTES] {
        let mut out = [0u8; GRID_CELLS_BYTES];
        for (i, (_, value)) in self.iter_cells().enumerate() {
            out[i * 8..i * 8 + 8].copy_from_slice(&f64::from(value).to_le_bytes());
        }
        out
    }

    /// Parses the persisted background file format written by
    /// [`Grid::to_bytes`].
    #[must_use]
    pub fn from_bytes(bytes: &[u8; GRID_CELLS_BYTES]) -> Self {
        Grid::from_fn(|cell| {
            let i = cell.row * GRID_COLS + cell.col;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
            f64::from_le_bytes(buf) as f32
        })
    }

    /// Persists this grid to `path` in the background file format. Staleness
    /// policy (e.g. rejecting a file older than N hours) is a caller
    /// concern; this only writes the bytes.
    pub fn save_file(&self, path: impl AsRef<std::path::Path>) -> crate::error::Result<()> {
        std::fs::write(path, self.to_bytes()).map_err(Into::into)
    }

    /// Loads a background file previously written by [`Grid::save_file`].
    pub fn load_file(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        let bytes = std::fs::read(path)?;
        let array: [u8; GRID_CELLS_BYTES] = bytes
            .try_into()
            .map_err(|_| crate::error::Error::FrameInvalid("persisted background file has the wrong length"))?;
        Ok(Self::from_bytes(&array))
    }
}

const GRID_CELLS_BYTES: usize = crate::consts::GRID_CELLS * 8;

/// A raw 8x8 Celsius temperature reading from the sensor.
pub type Frame = Grid<f32>;

/// The current per-cell baseline temperature.
pub type Background = Grid<f32>;

/// Per-cell `frame - background`.
pub type Delta = Grid<f32>;

/// Per-cell foreground classification.
pub type Mask = Grid<bool>;
