pub mod chroma_key;
pub mod png;
pub mod reference;

use image::RgbaImage;

/// Background pixels are rewritten to this value (fully transparent white).
pub const TRANSPARENT_WHITE: [u8; 4] = [255, 255, 255, 0];

/// Result of one background-removal run.
#[derive(Debug, Clone)]
pub struct Cutout {
    pub image: RgbaImage,
    /// Number of pixels classified as background.
    pub background_pixels: u64,
}
