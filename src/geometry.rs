// 画面ピクセル座標（左上原点）→ PDF座標（左下原点）の変換

use serde::Deserialize;

use crate::error::SignError;

/// 1件の署名配置。空間値はすべて描画面のピクセル座標（左上原点、Y下向き）。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRecord {
    #[serde(default)]
    pub placement_id: Option<String>,
    pub signature_id: String,
    #[serde(alias = "pageNum")]
    pub page_index: u32,
    pub x: f64,
    pub y: f64,
    pub width_px: f64,
    pub height_px: f64,
}

/// Pixel size of the rendering surface, shared by every page of one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchGeometry {
    pub rendered_page_width_px: f64,
    pub rendered_page_height_px: f64,
}

/// Intrinsic page size in document units (points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_units: f64,
    pub height_units: f64,
}

/// Rectangle in document space: `(x0, y0)` bottom-left, `(x1, y1)` top-right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

fn require_positive(value: f64, what: &str) -> crate::error::Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SignError::validation(format!(
            "{what} must be a positive number, got {value}"
        )))
    }
}

/// 配置のピクセル矩形をページのPDF座標矩形に変換する。
///
/// X/Yの倍率は独立に計算する（描画面とページのアスペクト比が異なれば署名は歪む）。
/// 水平位置は `[0, page.width_units - width]` にクランプする。署名幅がページ幅を
/// 超える場合は上限が負になり、`x0` も負になる。
///
/// Y軸: 配置のYは描画面の上端からの距離。PDFは左下原点なので
/// `y0 = page.height_units - y * scale_y - height` となる。
pub fn to_document_rect(
    placement: &PlacementRecord,
    batch: &BatchGeometry,
    page: &PageGeometry,
) -> crate::error::Result<Rect> {
    require_positive(batch.rendered_page_width_px, "renderedPageWidthPx")?;
    require_positive(batch.rendered_page_height_px, "renderedPageHeightPx")?;
    require_positive(placement.width_px, "widthPx")?;
    require_positive(placement.height_px, "heightPx")?;
    if !placement.x.is_finite() || !placement.y.is_finite() {
        return Err(SignError::validation(format!(
            "placement position must be finite, got ({}, {})",
            placement.x, placement.y
        )));
    }

    let scale_x = page.width_units / batch.rendered_page_width_px;
    let scale_y = page.height_units / batch.rendered_page_height_px;

    let width = placement.width_px * scale_x;
    let height = placement.height_px * scale_y;

    // f64::clamp panics when min > max, so apply the bounds one at a time.
    let x0 = (placement.x * scale_x).max(0.0).min(page.width_units - width);
    let x1 = x0 + width;

    let y_from_top = placement.y * scale_y;
    let y0 = page.height_units - y_from_top - height;
    let y1 = y0 + height;

    Ok(Rect { x0, y0, x1, y1 })
}
