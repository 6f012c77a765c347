//! Square byte matrices over the ring Z/256
//!
//! Every pixel block the validator multiplies is one of these. Arithmetic wraps
//! modulo 256, so a matrix is invertible exactly when its determinant is odd,
//! which is the same as being invertible over GF(2).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by matrix construction and arithmetic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    #[error("matrix must have at least one row")]
    Empty,

    #[error("row {row} has {found} entries, expected {expected}")]
    NotSquare {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("buffer of {found} bytes cannot fill a {dimension}x{dimension} matrix")]
    BufferLength { dimension: usize, found: usize },

    #[error("dimension mismatch: {left}x{left} times {right}x{right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("matrix is singular mod 256: no odd pivot in column {column}")]
    Singular { column: usize },
}

/// Row-major `n x n` matrix of bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteMatrix {
    dimension: usize,
    data: Vec<u8>,
}

impl ByteMatrix {
    /// All-zero matrix
    #[must_use]
    pub fn zeros(dimension: usize) -> Self {
        Self {
            dimension,
            data: vec![0; dimension * dimension],
        }
    }

    /// Identity matrix
    #[must_use]
    pub fn identity(dimension: usize) -> Self {
        let mut matrix = Self::zeros(dimension);
        for i in 0..dimension {
            matrix.set(i, i, 1);
        }
        matrix
    }

    /// Build from nested rows, rejecting ragged or empty input
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self, MatrixError> {
        let dimension = rows.len();
        if dimension == 0 {
            return Err(MatrixError::Empty);
        }

        let mut data = Vec::with_capacity(dimension * dimension);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != dimension {
                return Err(MatrixError::NotSquare {
                    row,
                    expected: dimension,
                    found: values.len(),
                });
            }
            data.extend(values);
        }

        Ok(Self { dimension, data })
    }

    /// Build from a flat buffer where entry `(r, c)` is `bytes[n * r + c]`
    pub fn from_row_major(dimension: usize, bytes: &[u8]) -> Result<Self, MatrixError> {
        if dimension == 0 {
            return Err(MatrixError::Empty);
        }
        if bytes.len() != dimension * dimension {
            return Err(MatrixError::BufferLength {
                dimension,
                found: bytes.len(),
            });
        }

        Ok(Self {
            dimension,
            data: bytes.to_vec(),
        })
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.dimension + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: u8) {
        self.data[row * self.dimension + col] = value;
    }

    /// Iterate over rows as slices
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.dimension)
    }

    /// Flatten back to row-major bytes
    #[must_use]
    pub fn to_row_major(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Matrix product modulo 256
    pub fn multiply(&self, other: &Self) -> Result<Self, MatrixError> {
        if self.dimension != other.dimension {
            return Err(MatrixError::DimensionMismatch {
                left: self.dimension,
                right: other.dimension,
            });
        }

        Ok(self.product(other))
    }

    /// `self * self` modulo 256
    #[must_use]
    pub fn square(&self) -> Self {
        self.product(self)
    }

    /// True when the determinant is odd
    #[must_use]
    pub fn is_invertible(&self) -> bool {
        // Rank over GF(2) of the parity bits, one u64 word per 64 columns.
        let n = self.dimension;
        let words = n.div_ceil(64);
        let mut parity: Vec<Vec<u64>> = self
            .rows()
            .map(|row| {
                let mut bits = vec![0u64; words];
                for (c, value) in row.iter().enumerate() {
                    if value & 1 == 1 {
                        bits[c / 64] |= 1 << (c % 64);
                    }
                }
                bits
            })
            .collect();

        for col in 0..n {
            let (word, bit) = (col / 64, 1u64 << (col % 64));
            let Some(pivot) = (col..n).find(|&r| parity[r][word] & bit != 0) else {
                return false;
            };
            parity.swap(pivot, col);
            let pivot_row = parity[col].clone();
            for (r, row) in parity.iter_mut().enumerate() {
                if r != col && row[word] & bit != 0 {
                    for (dst, src) in row.iter_mut().zip(&pivot_row) {
                        *dst ^= src;
                    }
                }
            }
        }
        true
    }

    /// Inverse modulo 256 by Gauss-Jordan elimination on odd pivots
    pub fn inverse(&self) -> Result<Self, MatrixError> {
        let n = self.dimension;
        let mut work = self.clone();
        let mut inverse = Self::identity(n);

        for col in 0..n {
            let pivot = (col..n)
                .find(|&r| work.get(r, col) & 1 == 1)
                .ok_or(MatrixError::Singular { column: col })?;

            if pivot != col {
                work.swap_rows(pivot, col);
                inverse.swap_rows(pivot, col);
            }

            let scale = invert_odd(work.get(col, col));
            work.scale_row(col, scale);
            inverse.scale_row(col, scale);

            for r in 0..n {
                let factor = work.get(r, col);
                if r == col || factor == 0 {
                    continue;
                }
                work.sub_scaled_row(r, col, factor);
                inverse.sub_scaled_row(r, col, factor);
            }
        }

        Ok(inverse)
    }

    /// Rewrite bit 0 of every entry so the parity pattern is the identity.
    ///
    /// The determinant becomes odd, so the result always has an inverse mod 256.
    /// Bits 1..=7 are untouched.
    pub fn force_unit_parity(&mut self) {
        let n = self.dimension;
        for r in 0..n {
            for c in 0..n {
                let value = self.get(r, c) & !1;
                self.set(r, c, value | u8::from(r == c));
            }
        }
    }

    fn product(&self, other: &Self) -> Self {
        let n = self.dimension;
        let mut product = Self::zeros(n);
        for r in 0..n {
            for c in 0..n {
                let acc = (0..n).fold(0u32, |acc, k| {
                    acc.wrapping_add(u32::from(self.get(r, k)) * u32::from(other.get(k, c)))
                });
                product.set(r, c, (acc & 0xff) as u8);
            }
        }
        product
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        let n = self.dimension;
        for c in 0..n {
            self.data.swap(a * n + c, b * n + c);
        }
    }

    fn scale_row(&mut self, row: usize, factor: u8) {
        let n = self.dimension;
        for value in &mut self.data[row * n..(row + 1) * n] {
            *value = value.wrapping_mul(factor);
        }
    }

    /// `row[target] -= factor * row[source]`
    fn sub_scaled_row(&mut self, target: usize, source: usize, factor: u8) {
        let n = self.dimension;
        for c in 0..n {
            let delta = self.data[source * n + c].wrapping_mul(factor);
            let value = &mut self.data[target * n + c];
            *value = value.wrapping_sub(delta);
        }
    }
}

/// Multiplicative inverse of an odd byte modulo 256.
///
/// `a * a == 1 (mod 8)` for odd `a`; each Newton step doubles the correct bits.
#[must_use]
pub const fn invert_odd(a: u8) -> u8 {
    let mut x = a;
    x = x.wrapping_mul(2u8.wrapping_sub(a.wrapping_mul(x)));
    x = x.wrapping_mul(2u8.wrapping_sub(a.wrapping_mul(x)));
    x
}
