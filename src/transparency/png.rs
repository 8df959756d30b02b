// image crate: RGBA -> PNG bytes / bytes -> RGBA

use std::io::Cursor;

use image::RgbaImage;

use crate::error::SignError;

/// Encode an RGBA image to PNG bytes.
///
/// Cutouts are always written as PNG (lossless, with alpha).
pub fn encode_rgba_to_png(img: &RgbaImage) -> crate::error::Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    img.write_with_encoder(encoder)
        .map_err(|e| SignError::processing(format!("PNG encode error: {e}")))?;
    Ok(buf.into_inner())
}

/// Decode any supported raster format to an RGBA buffer.
///
/// Palette, grayscale and RGB inputs are expanded to RGBA.
pub fn decode_to_rgba(bytes: &[u8]) -> crate::error::Result<RgbaImage> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| SignError::processing(format!("image format detection failed: {e}")))?;
    let decoded = reader
        .decode()
        .map_err(|e| SignError::processing(format!("image decode error: {e}")))?;
    Ok(decoded.into_rgba8())
}
