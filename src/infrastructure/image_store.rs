//! PNG persistence for the image pair

use image::{GrayImage, ImageFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::ImagePair;
use crate::infrastructure::error::{SolverError, SolverResult};

/// Where the two images of a pair go on disk
#[derive(Debug, Clone)]
pub struct ImageStore {
    first_path: PathBuf,
    second_path: PathBuf,
}

impl ImageStore {
    pub fn new(first_path: impl Into<PathBuf>, second_path: impl Into<PathBuf>) -> Self {
        Self {
            first_path: first_path.into(),
            second_path: second_path.into(),
        }
    }

    #[must_use]
    pub fn first_path(&self) -> &Path {
        &self.first_path
    }

    #[must_use]
    pub fn second_path(&self) -> &Path {
        &self.second_path
    }

    /// Write both images, replacing any previous pair
    pub fn write_pair(&self, pair: &ImagePair) -> SolverResult<()> {
        write_png(&self.first_path, pair.first())?;
        write_png(&self.second_path, pair.second())?;
        debug!(
            "Wrote image pair to {:?} and {:?}",
            self.first_path, self.second_path
        );
        Ok(())
    }
}

/// Write a grayscale PNG, creating parent directories as needed
pub fn write_png(path: &Path, image: &GrayImage) -> SolverResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SolverError::image_io(parent, e))?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| SolverError::image_io(path, e))
}

/// Read a PNG back as 8-bit grayscale
pub fn read_png(path: &Path) -> SolverResult<GrayImage> {
    image::open(path)
        .map(|img| img.into_luma8())
        .map_err(|e| SolverError::image_io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_png_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/img.png");

        let mut image = GrayImage::new(4, 3);
        image.put_pixel(1, 2, Luma([7]));
        image.put_pixel(3, 0, Luma([254]));
        write_png(&path, &image).unwrap();

        let read = read_png(&path).unwrap();
        assert_eq!(read.dimensions(), (4, 3));
        assert_eq!(read.as_raw(), image.as_raw());
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_png(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, SolverError::ImageIo { .. }));
    }
}
