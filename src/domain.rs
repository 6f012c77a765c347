//! Domain module - the arithmetic behind the forged images
//!
//! Pure, deterministic pieces: byte matrices over Z/256, the username-derived
//! QR payloads, and the composite image pair. No I/O lives here.

pub mod image_pair;
pub mod key_material;
pub mod matrix;

pub use image_pair::ImagePair;
pub use key_material::{KeyMaterial, PAYLOAD_LEN};
pub use matrix::{ByteMatrix, MatrixError};
