//! QR encoding into luma pixel grids
//!
//! Both payloads are encoded at one shared version so the two grids, and so
//! the two matrices built from them, have the same size.

use qrcode::bits::Bits;
use qrcode::{Color, EcLevel, QrCode, Version};

use crate::domain::{ByteMatrix, MatrixError};
use crate::infrastructure::config::KeygenConfig;
use crate::infrastructure::error::{SolverError, SolverResult};

pub const DARK: u8 = 0;
pub const LIGHT: u8 = 255;

const MAX_VERSION: i16 = 40;

/// A rendered QR code, `side x side` luma pixels, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrGrid {
    version: i16,
    side: usize,
    pixels: Vec<u8>,
}

impl QrGrid {
    #[must_use]
    pub const fn version(&self) -> i16 {
        self.version
    }

    #[must_use]
    pub const fn side(&self) -> usize {
        self.side
    }

    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.side + x]
    }

    /// Pixel row `y` becomes matrix row `y`
    pub fn to_matrix(&self) -> Result<ByteMatrix, MatrixError> {
        ByteMatrix::from_row_major(self.side, &self.pixels)
    }
}

pub struct QrEncoder {
    ec_level: EcLevel,
    box_size: usize,
    border: usize,
}

impl QrEncoder {
    pub fn new(ec_level: EcLevel, box_size: u32, border: u32) -> SolverResult<Self> {
        if box_size == 0 {
            return Err(SolverError::configuration("keygen.box_size", "must be greater than 0"));
        }
        Ok(Self {
            ec_level,
            box_size: box_size as usize,
            border: border as usize,
        })
    }

    pub fn from_config(config: &KeygenConfig) -> SolverResult<Self> {
        Self::new(parse_ec_level(&config.error_correction)?, config.box_size, config.border)
    }

    /// Encode both payloads at the smallest version that fits each of them
    pub fn encode_pair(&self, first: &[u8], second: &[u8]) -> SolverResult<(QrGrid, QrGrid)> {
        let version = self.minimal_version(first)?.max(self.minimal_version(second)?);
        Ok((self.encode_at(first, version)?, self.encode_at(second, version)?))
    }

    /// Smallest normal version whose byte-mode capacity holds `data`
    fn minimal_version(&self, data: &[u8]) -> SolverResult<i16> {
        (1..=MAX_VERSION)
            .find(|&v| self.byte_mode_bits(data, v).is_ok())
            .ok_or_else(|| SolverError::QrEncoding {
                message: format!("{} bytes do not fit any version at {:?}", data.len(), self.ec_level),
            })
    }

    fn encode_at(&self, data: &[u8], version: i16) -> SolverResult<QrGrid> {
        let bits = self.byte_mode_bits(data, version)?;
        let code = QrCode::with_bits(bits, self.ec_level).map_err(qr_error)?;
        Ok(self.render(&code, version))
    }

    /// `data` as one 8-bit segment. Optimized segmentation can pick Kanji for
    /// binary digests, and those decode back to different bytes.
    fn byte_mode_bits(&self, data: &[u8], version: i16) -> SolverResult<Bits> {
        let mut bits = Bits::new(Version::Normal(version));
        bits.push_byte_data(data).map_err(qr_error)?;
        bits.push_terminator(self.ec_level).map_err(qr_error)?;
        Ok(bits)
    }

    fn render(&self, code: &QrCode, version: i16) -> QrGrid {
        let modules = code.width();
        let colors = code.to_colors();
        let side = (modules + 2 * self.border) * self.box_size;

        let mut pixels = vec![LIGHT; side * side];
        for y in 0..side {
            for x in 0..side {
                let (mx, my) = (x / self.box_size, y / self.box_size);
                let inside = (self.border..self.border + modules).contains(&mx)
                    && (self.border..self.border + modules).contains(&my);
                if inside && colors[(my - self.border) * modules + (mx - self.border)] == Color::Dark {
                    pixels[y * side + x] = DARK;
                }
            }
        }

        QrGrid {
            version,
            side,
            pixels,
        }
    }
}

/// "L", "M", "Q" or "H", case-insensitive
pub fn parse_ec_level(level: &str) -> SolverResult<EcLevel> {
    match level.to_uppercase().as_str() {
        "L" => Ok(EcLevel::L),
        "M" => Ok(EcLevel::M),
        "Q" => Ok(EcLevel::Q),
        "H" => Ok(EcLevel::H),
        other => Err(SolverError::configuration(
            "keygen.error_correction",
            format!("unknown level '{other}'"),
        )),
    }
}

fn qr_error(error: qrcode::types::QrError) -> SolverError {
    SolverError::QrEncoding {
        message: error.to_string(),
    }
}
