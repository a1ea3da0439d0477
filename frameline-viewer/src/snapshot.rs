//! Binary PPM dumps of presented images.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::error::{ImageError, ImageResult, ParameterError, ParameterErrorKind};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

/// Write a `width`×`height` RGBA image as a binary (P6) PPM, dropping alpha.
pub fn write_ppm(path: &Path, width: u32, height: u32, rgba: &[u8]) -> ImageResult<()> {
    let expected = width as usize * height as usize * 4;
    let rgba = (rgba.len() == expected)
        .then(|| RgbaImage::from_raw(width, height, rgba.to_vec()))
        .flatten()
        .ok_or_else(|| {
            ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            ))
        })?;
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut out = BufWriter::new(File::create(path)?);
    PnmEncoder::new(&mut out)
        .with_subtype(PnmSubtype::Pixmap(SampleEncoding::Binary))
        .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_pixmap_without_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.ppm");
        let rgba = [1, 2, 3, 255, 4, 5, 6, 128];
        write_ppm(&path, 2, 1, &rgba).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"P6"));
        assert!(bytes.ends_with(&[1, 2, 3, 4, 5, 6]));

        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (2, 1));
        assert_eq!(decoded.as_raw().as_slice(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn rejects_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.ppm");
        assert!(write_ppm(&path, 4, 4, &[0; 8]).is_err());
        assert!(write_ppm(&path, 1, 1, &[0; 8]).is_err());
        assert!(!path.exists());
    }
}
