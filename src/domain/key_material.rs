//! Username-derived payloads for the two QR codes
//!
//! The first code carries `sha512(username)`. The second carries the square of
//! that digest laid out as an 8x8 byte matrix, read back row by row.

use sha2::{Digest, Sha512};

use super::matrix::{ByteMatrix, MatrixError};

/// Side of the digest matrix: 64 bytes as 8x8
pub const DIGEST_MATRIX_SIDE: usize = 8;

/// Length of a single payload in bytes
pub const PAYLOAD_LEN: usize = DIGEST_MATRIX_SIDE * DIGEST_MATRIX_SIDE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    username: String,
    first: [u8; PAYLOAD_LEN],
    second: [u8; PAYLOAD_LEN],
}

impl KeyMaterial {
    /// Derive both payloads for `username`
    pub fn derive(username: &str) -> Result<Self, MatrixError> {
        let digest = Sha512::digest(username.as_bytes());
        let mut first = [0u8; PAYLOAD_LEN];
        first.copy_from_slice(&digest);

        let squared = ByteMatrix::from_row_major(DIGEST_MATRIX_SIDE, &first)?.square();
        let mut second = [0u8; PAYLOAD_LEN];
        second.copy_from_slice(&squared.to_row_major());

        Ok(Self {
            username: username.to_string(),
            first,
            second,
        })
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Raw SHA-512 digest of the username
    #[must_use]
    pub const fn first_payload(&self) -> &[u8; PAYLOAD_LEN] {
        &self.first
    }

    /// Digest matrix squared mod 256
    #[must_use]
    pub const fn second_payload(&self) -> &[u8; PAYLOAD_LEN] {
        &self.second
    }
}
