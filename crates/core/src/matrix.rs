//! Dense 2-D storage for per-cell scalar fields.
//!
//! A [`Matrix`] holds one scalar field of a sub-domain: `size_x × size_y`
//! interior cells plus a one-cell ghost ring on every side, so the stored
//! extent is `(size_x + 2) × (size_y + 2)`. Interior cells are indexed
//! `1..=size_x` / `1..=size_y`; indices `0` and `size + 1` address the ghost
//! ring refreshed by halo exchange.

/// Dense 2-D field container, `(i, j)` indexed with a ghost ring.
///
/// Values are stored row-major (`j * width + i`) as `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f64>,
    width: usize,
    height: usize,
}

impl Matrix {
    /// Create a field for `size_x × size_y` interior cells, initialized to zero.
    ///
    /// The allocation includes the ghost ring, so `width() == size_x + 2`.
    #[must_use]
    pub fn new(size_x: usize, size_y: usize) -> Self {
        Self::with_value(size_x, size_y, 0.0)
    }

    /// Create a field initialized to `value` everywhere, ghost ring included.
    #[must_use]
    pub fn with_value(size_x: usize, size_y: usize, value: f64) -> Self {
        let width = size_x + 2;
        let height = size_y + 2;
        Self {
            data: vec![value; width * height],
            width,
            height,
        }
    }

    /// Stored width in cells (interior plus ghost ring).
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Stored height in cells (interior plus ghost ring).
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Value at `(i, j)`.
    ///
    /// # Panics
    ///
    /// Panics if the index is outside the stored extent.
    #[must_use]
    pub fn at(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.width && j < self.height, "index out of bounds");
        self.data[j * self.width + i]
    }

    /// Mutable reference to the value at `(i, j)`.
    ///
    /// # Panics
    ///
    /// Panics if the index is outside the stored extent.
    pub fn at_mut(&mut self, i: usize, j: usize) -> &mut f64 {
        assert!(i < self.width && j < self.height, "index out of bounds");
        &mut self.data[j * self.width + i]
    }

    /// Set the value at `(i, j)`.
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        *self.at_mut(i, j) = value;
    }

    /// Fill the entire field, ghost ring included.
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Copy every value from `other`, which must have the same extent.
    ///
    /// # Panics
    ///
    /// Panics if the extents differ.
    pub fn copy_from(&mut self, other: &Self) {
        assert!(
            self.width == other.width && self.height == other.height,
            "extent mismatch"
        );
        self.data.copy_from_slice(&other.data);
    }

    /// Borrow the raw row-major storage.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutably borrow the raw row-major storage.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Largest absolute value over the whole field.
    #[must_use]
    pub fn max_abs(&self) -> f64 {
        use rayon::prelude::*;
        self.data
            .par_iter()
            .map(|v| v.abs())
            .reduce(|| 0.0, f64::max)
    }

    /// Extract column `i` (full height, ghost rows included).
    #[must_use]
    pub fn column(&self, i: usize) -> Vec<f64> {
        (0..self.height).map(|j| self.at(i, j)).collect()
    }

    /// Extract row `j` (full width, ghost columns included).
    #[must_use]
    pub fn row(&self, j: usize) -> Vec<f64> {
        self.data[j * self.width..(j + 1) * self.width].to_vec()
    }

    /// Overwrite column `i` with `values`.
    ///
    /// # Panics
    ///
    /// Panics if `values.len()` differs from the stored height.
    pub fn set_column(&mut self, i: usize, values: &[f64]) {
        assert_eq!(values.len(), self.height, "column length mismatch");
        for (j, &v) in values.iter().enumerate() {
            self.set(i, j, v);
        }
    }

    /// Overwrite row `j` with `values`.
    ///
    /// # Panics
    ///
    /// Panics if `values.len()` differs from the stored width.
    pub fn set_row(&mut self, j: usize, values: &[f64]) {
        assert_eq!(values.len(), self.width, "row length mismatch");
        self.data[j * self.width..(j + 1) * self.width].copy_from_slice(values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_creation() {
        let m = Matrix::new(10, 20);
        assert_eq!(m.width(), 12);
        assert_eq!(m.height(), 22);
        assert!(m.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_matrix_with_value() {
        let m = Matrix::with_value(5, 5, 42.0);
        assert!(m.as_slice().iter().all(|&v| v == 42.0));
    }

    #[test]
    fn test_matrix_get_set() {
        let mut m = Matrix::new(10, 10);
        m.set(3, 4, 123.45);
        assert_eq!(m.at(3, 4), 123.45);

        // Verify row-major indexing
        let idx = 4 * 12 + 3;
        assert_eq!(m.as_slice()[idx], 123.45);
    }

    #[test]
    fn test_row_column_roundtrip() {
        let mut m = Matrix::new(4, 3);
        for j in 0..m.height() {
            m.set(2, j, j as f64);
        }
        let col = m.column(2);
        assert_eq!(col, vec![0.0, 1.0, 2.0, 3.0, 4.0]);

        let mut other = Matrix::new(4, 3);
        other.set_column(0, &col);
        assert_eq!(other.column(0), col);

        m.set_row(1, &[9.0; 6]);
        assert_eq!(m.row(1), vec![9.0; 6]);
        assert_eq!(m.at(2, 1), 9.0);
    }

    #[test]
    fn test_max_abs() {
        let mut m = Matrix::new(6, 6);
        m.set(1, 1, -7.5);
        m.set(4, 2, 3.0);
        assert_eq!(m.max_abs(), 7.5);
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn test_bounds_check() {
        let m = Matrix::new(10, 10);
        let _ = m.at(12, 5);
    }
}
