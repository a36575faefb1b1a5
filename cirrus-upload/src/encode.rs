use std::io::Cursor;

use bytes::Bytes;
use cirrus_core::{MediaError, MediaResult};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

/// Image handed to `upload_image`
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Already encoded (JPEG, PNG, ...) bytes, sent as-is
    Encoded(Bytes),
    /// Decoded pixels, JPEG-encoded before upload
    Bitmap(DynamicImage),
}

impl ImageSource {
    /// Bytes ready for upload
    pub fn into_bytes(self, jpeg_quality: u8) -> MediaResult<Bytes> {
        match self {
            ImageSource::Encoded(bytes) if bytes.is_empty() => {
                Err(MediaError::encode_failed("empty image buffer"))
            }
            ImageSource::Encoded(bytes) => Ok(bytes),
            ImageSource::Bitmap(image) => encode_jpeg(&image, jpeg_quality),
        }
    }
}

impl From<Bytes> for ImageSource {
    fn from(bytes: Bytes) -> Self {
        ImageSource::Encoded(bytes)
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Encoded(Bytes::from(bytes))
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        ImageSource::Bitmap(image)
    }
}

/// Encode a bitmap as JPEG; alpha is dropped
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> MediaResult<Bytes> {
    if image.width() == 0 || image.height() == 0 {
        return Err(MediaError::encode_failed("bitmap has no pixels"));
    }

    let rgb = image.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| MediaError::encode_failed(e.to_string()))?;

    Ok(Bytes::from(out.into_inner()))
}
