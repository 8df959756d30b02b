// クロマキー: 参照色に近いピクセルを透明化する

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use super::png::{decode_to_rgba, encode_rgba_to_png};
use super::reference::{BackgroundSampling, rgb_within, sample_reference};
use super::{Cutout, TRANSPARENT_WHITE};

/// 参照色がこのアルファ未満なら、背景サンプル自体が半透明とみなす。
const TRANSLUCENT_REFERENCE_ALPHA: u8 = 200;
/// 半透明背景のとき、このアルファ未満のピクセルは背景。
const TRANSLUCENT_PIXEL_ALPHA: u8 = 50;
/// 色に関係なく、このアルファ未満のピクセルは常に背景。
const NEAR_TRANSPARENT_ALPHA: u8 = 20;

/// ピクセル1つを背景として分類するかどうか。
///
/// 以下のいずれかを満たせば背景:
/// 1. R,G,B すべてが参照色から `tolerance` 以内（チャンネル独立、ユークリッド距離ではない）
/// 2. 参照色のアルファが 200 未満 かつ ピクセルのアルファが 50 未満
/// 3. ピクセルのアルファが 20 未満
#[inline]
pub fn is_background(pixel: &[u8], reference: &Rgba<u8>, tolerance: u8) -> bool {
    let alpha = pixel[3];
    rgb_within(pixel, &reference.0, tolerance)
        || (reference.0[3] < TRANSLUCENT_REFERENCE_ALPHA && alpha < TRANSLUCENT_PIXEL_ALPHA)
        || alpha < NEAR_TRANSPARENT_ALPHA
}

/// Classify every pixel of `img` against `reference`.
///
/// Returns one flag per pixel in row-major order.
pub fn background_mask(img: &RgbaImage, reference: &Rgba<u8>, tolerance: u8) -> Vec<bool> {
    img.as_raw()
        .par_chunks_exact(4)
        .map(|px| is_background(px, reference, tolerance))
        .collect()
}

/// Rewrite masked pixels to transparent white; others pass through untouched.
fn apply_mask(img: &mut RgbaImage, mask: &[bool]) {
    let buf: &mut [u8] = img;
    buf.par_chunks_exact_mut(4)
        .zip(mask.par_iter())
        .filter(|(_, bg)| **bg)
        .for_each(|(px, _)| px.copy_from_slice(&TRANSPARENT_WHITE));
}

/// 画像バイト列をデコードし、背景を透明化した画像を返す。
///
/// 入力バイト列は変更しない。同じ入力と許容値に対して結果は常に同一。
pub fn remove_background(
    image_bytes: &[u8],
    tolerance: u8,
    sampling: BackgroundSampling,
) -> crate::error::Result<Cutout> {
    let mut image = decode_to_rgba(image_bytes)?;
    let sample = sample_reference(&image, sampling, tolerance);

    let mask = background_mask(&image, &sample.color, tolerance);
    let background_pixels = mask.iter().filter(|bg| **bg).count() as u64;
    apply_mask(&mut image, &mask);

    tracing::debug!(
        width = image.width(),
        height = image.height(),
        reference = ?sample.color.0,
        degraded = sample.degraded,
        tolerance,
        background_pixels,
        "background removed"
    );

    Ok(Cutout {
        image,
        background_pixels,
    })
}

/// 背景を除去してPNGバイト列として返す（単体変換ジョブ用）。
pub fn convert_signature(
    image_bytes: &[u8],
    tolerance: u8,
    sampling: BackgroundSampling,
) -> crate::error::Result<Vec<u8>> {
    let cutout = remove_background(image_bytes, tolerance, sampling)?;
    encode_rgba_to_png(&cutout.image)
}
