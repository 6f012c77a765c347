//! The two composite images handed to the validator
//!
//! Each image is a `2s x 2s` grayscale square holding two `s x s` blocks on its
//! diagonal and zeros elsewhere:
//!
//! ```text
//!   first  = | A   0    |     second = | A^-1  0 |
//!            | 0   B^-1 |              | 0     B |
//! ```
//!
//! so that `first * second` is the identity modulo 256.

use image::{GrayImage, Luma};

use super::matrix::{ByteMatrix, MatrixError};

#[derive(Debug, Clone)]
pub struct ImagePair {
    side: usize,
    first: GrayImage,
    second: GrayImage,
}

impl ImagePair {
    /// Lay out the four blocks. All of them must share one dimension.
    pub fn compose(
        a: &ByteMatrix,
        a_inv: &ByteMatrix,
        b: &ByteMatrix,
        b_inv: &ByteMatrix,
    ) -> Result<Self, MatrixError> {
        let side = a.dimension();
        for other in [a_inv, b, b_inv] {
            if other.dimension() != side {
                return Err(MatrixError::DimensionMismatch {
                    left: side,
                    right: other.dimension(),
                });
            }
        }

        let full = (side * 2) as u32;
        let mut first = GrayImage::new(full, full);
        let mut second = GrayImage::new(full, full);

        paint_block(&mut first, a, 0);
        paint_block(&mut first, b_inv, side);
        paint_block(&mut second, a_inv, 0);
        paint_block(&mut second, b, side);

        Ok(Self {
            side,
            first,
            second,
        })
    }

    /// Side of one diagonal block in pixels
    #[must_use]
    pub const fn block_side(&self) -> usize {
        self.side
    }

    #[must_use]
    pub const fn first(&self) -> &GrayImage {
        &self.first
    }

    #[must_use]
    pub const fn second(&self) -> &GrayImage {
        &self.second
    }

    /// Both images as full-size byte matrices (pixel row `y` is matrix row `y`)
    pub fn as_matrices(&self) -> Result<(ByteMatrix, ByteMatrix), MatrixError> {
        let n = self.side * 2;
        Ok((
            ByteMatrix::from_row_major(n, self.first.as_raw())?,
            ByteMatrix::from_row_major(n, self.second.as_raw())?,
        ))
    }

    /// True when `first * second` is the identity mod 256
    #[must_use]
    pub fn multiplies_to_identity(&self) -> bool {
        self.as_matrices()
            .and_then(|(first, second)| first.multiply(&second))
            .is_ok_and(|product| product == ByteMatrix::identity(self.side * 2))
    }

    /// blake3 digest over both images, hex encoded
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.first.as_raw());
        hasher.update(self.second.as_raw());
        hasher.finalize().to_hex().to_string()
    }
}

fn paint_block(image: &mut GrayImage, block: &ByteMatrix, offset: usize) {
    for (y, row) in block.rows().enumerate() {
        for (x, value) in row.iter().enumerate() {
            image.put_pixel((x + offset) as u32, (y + offset) as u32, Luma([*value]));
        }
    }
}
