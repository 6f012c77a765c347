//! Keygen service: username in, validator-passing image pair out
//!
//! For a username the service
//! 1. derives the two QR payloads,
//! 2. renders both QR codes at one shared size,
//! 3. XORs a little noise into every pixel,
//! 4. fixes the parity pattern so both grids are invertible mod 256,
//! 5. lays out `diag(A, B^-1)` and `diag(A^-1, B)`.

use std::sync::Mutex;
use tracing::{debug, info};

use crate::domain::{ByteMatrix, ImagePair, KeyMaterial};
use crate::infrastructure::config::KeygenConfig;
use crate::infrastructure::error::{SolverError, SolverResult};
use crate::infrastructure::qr_encoder::QrEncoder;

/// Everything produced for one username
#[derive(Debug, Clone)]
pub struct GeneratedImages {
    pub material: KeyMaterial,
    pub qr_version: i16,
    pub pair: ImagePair,
}

pub struct KeygenService {
    encoder: QrEncoder,
    noise_mask: u8,
    rng: Mutex<fastrand::Rng>,
}

impl KeygenService {
    /// Service with an entropy-seeded noise source
    pub fn new(config: &KeygenConfig) -> SolverResult<Self> {
        Self::with_rng(config, fastrand::Rng::new())
    }

    /// Service with a fixed seed; same username and seed give the same images
    pub fn with_seed(config: &KeygenConfig, seed: u64) -> SolverResult<Self> {
        Self::with_rng(config, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(config: &KeygenConfig, rng: fastrand::Rng) -> SolverResult<Self> {
        Ok(Self {
            encoder: QrEncoder::from_config(config)?,
            noise_mask: config.noise_mask,
            rng: Mutex::new(rng),
        })
    }

    pub fn generate(&self, username: &str) -> SolverResult<GeneratedImages> {
        let material = KeyMaterial::derive(username)?;
        let (first_qr, second_qr) = self
            .encoder
            .encode_pair(material.first_payload(), material.second_payload())?;
        debug!(
            "QR version {} rendered at {}x{} pixels",
            first_qr.version(),
            first_qr.side(),
            first_qr.side()
        );

        let mut a = first_qr.to_matrix()?;
        let mut b = second_qr.to_matrix()?;
        self.add_noise(&mut a)?;
        self.add_noise(&mut b)?;

        a.force_unit_parity();
        b.force_unit_parity();
        let a_inv = a.inverse()?;
        let b_inv = b.inverse()?;

        let pair = ImagePair::compose(&a, &a_inv, &b, &b_inv)?;
        info!(
            "🧩 Generated {}x{} image pair for {} ({})",
            pair.block_side() * 2,
            pair.block_side() * 2,
            username,
            &pair.fingerprint()[..16]
        );

        Ok(GeneratedImages {
            material,
            qr_version: first_qr.version(),
            pair,
        })
    }

    fn add_noise(&self, matrix: &mut ByteMatrix) -> SolverResult<()> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| SolverError::configuration("keygen.rng", "noise source poisoned"))?;

        let n = matrix.dimension();
        for r in 0..n {
            for c in 0..n {
                let noise = rng.u8(0..=self.noise_mask);
                matrix.set(r, c, matrix.get(r, c) ^ noise);
            }
        }
        Ok(())
    }
}
