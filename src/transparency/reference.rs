// 背景色（参照色）のサンプリング

use image::{Rgba, RgbaImage};
use serde::Deserialize;

/// Fallback exemplar when the anchor pixel cannot be read.
pub const DEFAULT_REFERENCE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// 背景色のサンプリング方法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundSampling {
    /// 左上 (0,0) の1ピクセルのみ。
    #[default]
    Anchor,
    /// 四隅をサンプリングし、最も多くの隅と一致する色を採用する。
    /// 同数の場合は (0,0) を優先する。
    Corners,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceSample {
    pub color: Rgba<u8>,
    pub degraded: bool,
}

/// R,G,B の各チャンネル差がすべて `tolerance` 以内なら `true`。
#[inline]
pub(crate) fn rgb_within(a: &[u8], b: &[u8], tolerance: u8) -> bool {
    a[..3]
        .iter()
        .zip(&b[..3])
        .all(|(&x, &y)| x.abs_diff(y) <= tolerance)
}

/// 画像から背景の参照色を取得する。
///
/// (0,0) が読めない（空画像など）場合は不透明の白を使い、`degraded` を立てる。
pub fn sample_reference(
    img: &RgbaImage,
    sampling: BackgroundSampling,
    tolerance: u8,
) -> ReferenceSample {
    let Some(anchor) = img.get_pixel_checked(0, 0).copied() else {
        tracing::warn!(
            width = img.width(),
            height = img.height(),
            "anchor pixel unreadable, assuming opaque white background"
        );
        return ReferenceSample {
            color: DEFAULT_REFERENCE,
            degraded: true,
        };
    };

    let color = match sampling {
        BackgroundSampling::Anchor => anchor,
        BackgroundSampling::Corners => pick_corner_consensus(img, anchor, tolerance),
    };

    ReferenceSample {
        color,
        degraded: false,
    }
}

fn pick_corner_consensus(img: &RgbaImage, anchor: Rgba<u8>, tolerance: u8) -> Rgba<u8> {
    let (w, h) = img.dimensions();
    let corners = [
        anchor,
        *img.get_pixel(w - 1, 0),
        *img.get_pixel(0, h - 1),
        *img.get_pixel(w - 1, h - 1),
    ];

    let agreement = |c: &Rgba<u8>| {
        corners
            .iter()
            .filter(|other| rgb_within(&c.0, &other.0, tolerance))
            .count()
    };

    // Strictly greater keeps the anchor on ties.
    let mut best = anchor;
    let mut best_votes = agreement(&anchor);
    for corner in &corners[1..] {
        let votes = agreement(corner);
        if votes > best_votes {
            best = *corner;
            best_votes = votes;
        }
    }

    if best != anchor {
        tracing::debug!(
            anchor = ?anchor.0,
            chosen = ?best.0,
            votes = best_votes,
            "anchor pixel disagrees with the other corners"
        );
    }
    best
}
