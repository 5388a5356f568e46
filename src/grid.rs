//! Occupancy grid: discrete rows/columns over the continuous world.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("grid needs at least one row and one column, got {rows}x{cols}")]
    Empty { rows: usize, cols: usize },
    #[error("cell size must be positive and finite, got {0}")]
    InvalidCellSize(f64),
}

/// Row-major table of locked cells. `y = 0` is the top row.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyGrid {
    rows: usize,
    cols: usize,
    cell_size: f64,
    /// Palette index per cell; `None` is empty.
    cells: Vec<Option<u8>>,
}

impl OccupancyGrid {
    pub fn new(rows: usize, cols: usize, cell_size: f64) -> Result<Self, GridError> {
        if rows == 0 || cols == 0 {
            return Err(GridError::Empty { rows, cols });
        }
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(GridError::InvalidCellSize(cell_size));
        }
        Ok(Self {
            rows,
            cols,
            cell_size,
            cells: vec![None; rows * cols],
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    #[inline]
    pub fn world_width(&self) -> f64 {
        self.cols as f64 * self.cell_size
    }

    #[inline]
    pub fn world_height(&self) -> f64 {
        self.rows as f64 * self.cell_size
    }

    /// Map world coordinates to `(row, col)`. The result may lie outside the grid.
    #[inline]
    pub fn to_grid(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (y / self.cell_size).floor() as i64,
            (x / self.cell_size).floor() as i64,
        )
    }

    /// Like [`OccupancyGrid::to_grid`] but `None` outside the grid.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let (row, col) = self.to_grid(x, y);
        let row = usize::try_from(row).ok().filter(|r| *r < self.rows)?;
        let col = usize::try_from(col).ok().filter(|c| *c < self.cols)?;
        Some((row, col))
    }

    /// Row whose band contains `y`, if any.
    pub fn row_of(&self, y: f64) -> Option<usize> {
        if !y.is_finite() {
            return None;
        }
        usize::try_from((y / self.cell_size).floor() as i64)
            .ok()
            .filter(|r| *r < self.rows)
    }

    /// Vertical extent `[top, bottom)` of `row` in world units.
    pub fn row_band(&self, row: usize) -> (f64, f64) {
        let top = row as f64 * self.cell_size;
        (top, top + self.cell_size)
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| row * self.cols + col)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        self.index(row, col).and_then(|i| self.cells[i])
    }

    /// Write `color` into a cell. Returns false for out-of-range cells.
    pub fn lock_cell(&mut self, row: usize, col: usize, color: u8) -> bool {
        match self.index(row, col) {
            Some(i) => {
                self.cells[i] = Some(color);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(None);
    }

    pub fn clear_row(&mut self, row: usize) {
        if row < self.rows {
            let start = row * self.cols;
            self.cells[start..start + self.cols].fill(None);
        }
    }

    pub fn is_row_full(&self, row: usize) -> bool {
        row < self.rows && {
            let start = row * self.cols;
            self.cells[start..start + self.cols].iter().all(Option::is_some)
        }
    }

    /// Indices of all full rows, top to bottom.
    pub fn full_rows(&self) -> Vec<usize> {
        (0..self.rows).filter(|r| self.is_row_full(*r)).collect()
    }

    /// Number of locked cells in `row`.
    pub fn row_fill(&self, row: usize) -> usize {
        (0..self.cols).filter(|&col| self.get(row, col).is_some()).count()
    }

    /// `(row, col, color)` for every locked cell.
    pub fn locked_cells(&self) -> impl Iterator<Item = (usize, usize, u8)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.map(|color| (i / self.cols, i % self.cols, color)))
    }
}
