// 配置リクエスト(JSON)の解析
//
// {"renderedPageWidthPx": 800, "renderedPageHeightPx": 1035, "placements": [...]}
//
// バッチ全体の寸法が不正ならリクエストごと拒否する。個々の配置の不正
// （フィールド欠落・数値でない値・負のページ番号）はその配置だけを除外する。

use serde::Deserialize;

use crate::error::SignError;
use crate::geometry::{BatchGeometry, PlacementRecord};
use crate::pipeline::compositor::SkippedPlacement;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    rendered_page_width_px: f64,
    rendered_page_height_px: f64,
    placements: Vec<serde_json::Value>,
}

#[derive(Debug)]
pub struct SignRequest {
    pub batch: BatchGeometry,
    pub placements: Vec<PlacementRecord>,
    /// Position in the JSON `placements` array of each entry of `placements`.
    pub wire_indices: Vec<usize>,
    /// Wire entries that could not be parsed; `index` is the position in the JSON array.
    pub rejected: Vec<SkippedPlacement>,
}

impl SignRequest {
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        let wire: WireRequest = serde_json::from_str(json)
            .map_err(|e| SignError::validation(format!("Invalid sign request: {e}")))?;

        for (name, value) in [
            ("renderedPageWidthPx", wire.rendered_page_width_px),
            ("renderedPageHeightPx", wire.rendered_page_height_px),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SignError::validation(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }

        let mut placements = Vec::with_capacity(wire.placements.len());
        let mut wire_indices = Vec::with_capacity(wire.placements.len());
        let mut rejected = Vec::new();
        for (index, value) in wire.placements.into_iter().enumerate() {
            let placement_id = value
                .get("placementId")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);
            match serde_json::from_value::<PlacementRecord>(value) {
                Ok(record) => {
                    placements.push(record);
                    wire_indices.push(index);
                }
                Err(e) => {
                    tracing::warn!(index, error = %e, "malformed placement rejected");
                    rejected.push(SkippedPlacement {
                        index,
                        placement_id,
                        signature_id: None,
                        reason: format!("malformed placement: {e}"),
                    });
                }
            }
        }

        Ok(SignRequest {
            batch: BatchGeometry {
                rendered_page_width_px: wire.rendered_page_width_px,
                rendered_page_height_px: wire.rendered_page_height_px,
            },
            placements,
            wire_indices,
            rejected,
        })
    }

    pub fn from_file(path: &std::path::Path, max_bytes: u64) -> crate::error::Result<Self> {
        let bytes = super::read_capped(path, max_bytes)?;
        let json = String::from_utf8(bytes)
            .map_err(|e| SignError::validation(format!("Sign request is not UTF-8: {e}")))?;
        Self::from_json(&json)
    }
}
