use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("cannot decode {path}: {reason}")]
    Unsupported { path: PathBuf, reason: String },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// An image decoded into memory, plus its EXIF payload if the container had one.
pub struct DecodedImage {
    pub image: DynamicImage,
    pub exif: Option<Vec<u8>>,
}

/// Decodes container formats whose tags are not reachable by a plain byte scan.
pub trait ImageDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage, DecodeError>;
}

/// Encode `image` as an in-memory JPEG stream.
pub fn reencode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    // The JPEG encoder only takes 8-bit RGB/L.
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buf = Cursor::new(Vec::new());
    rgb.write_to(&mut buf, ImageFormat::Jpeg)?;
    Ok(buf.into_inner())
}

/// The decoder used for HEIF files, if this build has one and it is enabled.
pub fn default_decoder(enabled: bool) -> Option<Box<dyn ImageDecoder>> {
    if !enabled {
        return None;
    }
    #[cfg(feature = "heif")]
    {
        Some(Box::new(heif::HeifDecoder))
    }
    #[cfg(not(feature = "heif"))]
    {
        log::debug!("built without the `heif` feature; HEIF files use the raw tag scan");
        None
    }
}

#[cfg(feature = "heif")]
pub mod heif {
    use std::path::Path;

    use image::{DynamicImage, RgbImage};
    use libheif_rs::{ColorSpace, HeifContext, RgbChroma};

    use super::{DecodeError, DecodedImage, ImageDecoder};

    /// HEIC/HEIF decoding through libheif.
    pub struct HeifDecoder;

    impl ImageDecoder for HeifDecoder {
        fn decode(&self, path: &Path) -> Result<DecodedImage, DecodeError> {
            let fail = |reason: String| DecodeError::Unsupported {
                path: path.to_path_buf(),
                reason,
            };
            let path_str = path.to_str().ok_or_else(|| fail("path is not UTF-8".into()))?;

            let ctx = HeifContext::read_from_file(path_str).map_err(|e| fail(e.to_string()))?;
            let handle = ctx.primary_image_handle().map_err(|e| fail(e.to_string()))?;

            let exif = handle
                .metadata_block_ids(b"Exif")
                .first()
                .and_then(|id| handle.metadata(*id).ok());

            let decoded = handle
                .decode(ColorSpace::Rgb(RgbChroma::Rgb), None)
                .map_err(|e| fail(e.to_string()))?;
            let width = decoded.width();
            let height = decoded.height();
            let plane = decoded
                .planes()
                .interleaved
                .ok_or_else(|| fail("no interleaved plane".into()))?;

            let row_len = width as usize * 3;
            let mut pixels = Vec::with_capacity(row_len * height as usize);
            for row in plane.data.chunks(plane.stride).take(height as usize) {
                pixels.extend_from_slice(row.get(..row_len).ok_or_else(|| fail("short row".into()))?);
            }
            let rgb = RgbImage::from_raw(width, height, pixels)
                .ok_or_else(|| fail("pixel buffer size mismatch".into()))?;

            Ok(DecodedImage {
                image: DynamicImage::ImageRgb8(rgb),
                exif,
            })
        }
    }
}
