// 配置バッチの合成: 検証 → 背景除去(キャッシュ) → 座標変換 → 埋め込み
//
// 配置単位のデータ不正はスキップして続行する。文書側のエラーはバッチ全体を中断する。

use crate::cache::store::ProcessedSignatureCache;
use crate::error::SignError;
use crate::geometry::{BatchGeometry, PlacementRecord, to_document_rect};
use crate::pdf::SignableDocument;
use crate::pipeline::signature_source::SignatureSource;
use crate::transparency::reference::BackgroundSampling;

/// 適用されなかった配置。
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPlacement {
    /// 入力リスト内の位置（0-indexed）。
    pub index: usize,
    pub placement_id: Option<String>,
    pub signature_id: Option<String>,
    pub reason: String,
}

/// 1バッチの結果。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeSummary {
    /// 埋め込みに成功した配置数。
    pub applied: usize,
    pub skipped: Vec<SkippedPlacement>,
    /// 背景除去エンジンの実行回数。
    pub engine_invocations: usize,
    pub cache_hits: usize,
}

fn validate_placement<D: SignableDocument, S: SignatureSource + ?Sized>(
    placement: &PlacementRecord,
    document: &D,
    source: &S,
) -> crate::error::Result<()> {
    for (name, value) in [("widthPx", placement.width_px), ("heightPx", placement.height_px)] {
        if !(value.is_finite() && value > 0.0) {
            return Err(SignError::validation(format!(
                "{name} must be a positive number, got {value}"
            )));
        }
    }
    if !placement.x.is_finite() || !placement.y.is_finite() {
        return Err(SignError::validation("placement position must be finite"));
    }
    let page_count = document.page_count();
    if placement.page_index >= page_count {
        return Err(SignError::validation(format!(
            "page index {} out of range (document has {page_count} pages)",
            placement.page_index
        )));
    }
    if !source.contains(&placement.signature_id) {
        return Err(SignError::validation(format!(
            "unknown signature id '{}'",
            placement.signature_id
        )));
    }
    Ok(())
}

/// 1件の配置を適用する。ValidationError/ProcessingError はスキップ対象。
fn apply_placement<D: SignableDocument, S: SignatureSource + ?Sized>(
    document: &mut D,
    placement: &PlacementRecord,
    source: &S,
    batch: &BatchGeometry,
    cache: &mut ProcessedSignatureCache,
) -> crate::error::Result<()> {
    validate_placement(placement, document, source)?;
    let image = cache.resolve(&placement.signature_id, source)?;
    let page = document.page_geometry(placement.page_index)?;
    let rect = to_document_rect(placement, batch, &page)?;
    document.embed_image(placement.page_index, &rect, image)?;
    tracing::debug!(
        signature_id = %placement.signature_id,
        page_index = placement.page_index,
        x0 = rect.x0,
        y0 = rect.y0,
        x1 = rect.x1,
        y1 = rect.y1,
        "placement applied"
    );
    Ok(())
}

/// 配置リストを順番に文書へ合成する。
///
/// 同じ `signatureId` の背景除去はバッチ内で1回だけ実行される。キャッシュは
/// この呼び出しの間だけ存在し、成功・失敗にかかわらず戻る時点で破棄される。
///
/// 配置単位の不正（寸法・ページ範囲・未登録ID・デコード失敗）は `skipped` に記録する。
/// 文書側のエラー（ページ情報の取得失敗・埋め込み失敗）はそのまま返す。
pub fn composite<D: SignableDocument, S: SignatureSource + ?Sized>(
    document: &mut D,
    placements: &[PlacementRecord],
    source: &S,
    batch: &BatchGeometry,
    tolerance: u8,
    sampling: BackgroundSampling,
) -> crate::error::Result<CompositeSummary> {
    let mut cache = ProcessedSignatureCache::new(tolerance, sampling);
    let mut summary = CompositeSummary::default();

    for (index, placement) in placements.iter().enumerate() {
        match apply_placement(document, placement, source, batch, &mut cache) {
            Ok(()) => summary.applied += 1,
            Err(e) if !e.is_batch_fatal() => {
                tracing::warn!(
                    index,
                    signature_id = %placement.signature_id,
                    error = %e,
                    "placement skipped"
                );
                summary.skipped.push(SkippedPlacement {
                    index,
                    placement_id: placement.placement_id.clone(),
                    signature_id: Some(placement.signature_id.clone()),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    summary.engine_invocations = cache.invocations();
    summary.cache_hits = cache.hits();
    tracing::info!(
        applied = summary.applied,
        skipped = summary.skipped.len(),
        engine_invocations = summary.engine_invocations,
        "batch composited"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ProcessedSignature;
    use crate::geometry::{PageGeometry, Rect};
    use crate::transparency::png::encode_rgba_to_png;
    use image::{Rgba, RgbaImage};
    use std::collections::HashMap;

    /// 埋め込み呼び出しを記録するだけの文書。
    struct RecordingDocument {
        pages: Vec<PageGeometry>,
        embedded: Vec<(u32, Rect)>,
        fail_geometry: bool,
    }

    impl RecordingDocument {
        fn letter(pages: usize) -> Self {
            Self {
                pages: vec![
                    PageGeometry {
                        width_units: 612.0,
                        height_units: 792.0,
                    };
                    pages
                ],
                embedded: Vec::new(),
                fail_geometry: false,
            }
        }
    }

    impl SignableDocument for RecordingDocument {
        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        fn page_geometry(&self, page_index: u32) -> crate::error::Result<PageGeometry> {
            if self.fail_geometry {
                return Err(SignError::document("MediaBox not found"));
            }
            self.pages
                .get(page_index as usize)
                .copied()
                .ok_or_else(|| SignError::document("no such page"))
        }

        fn embed_image(
            &mut self,
            page_index: u32,
            rect: &Rect,
            _image: &ProcessedSignature,
        ) -> crate::error::Result<()> {
            self.embedded.push((page_index, *rect));
            Ok(())
        }
    }

    fn signature_png() -> Vec<u8> {
        let mut img = RgbaImage::from_pixel(20, 8, Rgba([255, 255, 255, 255]));
        for x in 2..18 {
            img.put_pixel(x, 4, Rgba([0, 0, 128, 255]));
        }
        encode_rgba_to_png(&img).unwrap()
    }

    fn placement(signature_id: &str, page_index: u32) -> PlacementRecord {
        PlacementRecord {
            placement_id: None,
            signature_id: signature_id.to_string(),
            page_index,
            x: 100.0,
            y: 50.0,
            width_px: 200.0,
            height_px: 80.0,
        }
    }

    const BATCH: BatchGeometry = BatchGeometry {
        rendered_page_width_px: 800.0,
        rendered_page_height_px: 1035.0,
    };

    fn source() -> HashMap<String, Vec<u8>> {
        HashMap::from([("alice".to_string(), signature_png())])
    }

    #[test]
    fn test_unknown_signature_is_skipped() {
        let mut doc = RecordingDocument::letter(2);
        let placements = vec![
            placement("alice", 0),
            placement("nobody", 0),
            placement("alice", 1),
        ];

        let summary = composite(
            &mut doc,
            &placements,
            &source(),
            &BATCH,
            30,
            BackgroundSampling::Anchor,
        )
        .expect("batch must not fail");

        assert_eq!(summary.applied, 2);
        assert_eq!(doc.embedded.len(), 2);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].index, 1);
        assert_eq!(summary.skipped[0].signature_id.as_deref(), Some("nobody"));
    }

    #[test]
    fn test_same_signature_processed_once() {
        let mut doc = RecordingDocument::letter(1);
        let placements = vec![placement("alice", 0), placement("alice", 0)];

        let summary = composite(
            &mut doc,
            &placements,
            &source(),
            &BATCH,
            30,
            BackgroundSampling::Anchor,
        )
        .unwrap();

        assert_eq!(summary.applied, 2);
        assert_eq!(summary.engine_invocations, 1);
        assert_eq!(summary.cache_hits, 1);
    }

    #[test]
    fn test_invalid_placements_are_skipped_not_fatal() {
        let mut doc = RecordingDocument::letter(1);
        let mut zero_width = placement("alice", 0);
        zero_width.width_px = 0.0;
        let mut negative_height = placement("alice", 0);
        negative_height.height_px = -5.0;
        let out_of_range = placement("alice", 1);

        let summary = composite(
            &mut doc,
            &[zero_width, negative_height, out_of_range],
            &source(),
            &BATCH,
            30,
            BackgroundSampling::Anchor,
        )
        .unwrap();

        assert_eq!(summary.applied, 0);
        let indices: Vec<usize> = summary.skipped.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(doc.embedded.is_empty());
        // 検証で落ちた配置はエンジンを起動しない
        assert_eq!(summary.engine_invocations, 0);
    }

    #[test]
    fn test_undecodable_signature_is_skipped_every_time() {
        let mut doc = RecordingDocument::letter(1);
        let mut src = source();
        src.insert("broken".to_string(), b"not an image".to_vec());
        let placements = vec![
            placement("broken", 0),
            placement("alice", 0),
            placement("broken", 0),
        ];

        let summary = composite(
            &mut doc,
            &placements,
            &src,
            &BATCH,
            30,
            BackgroundSampling::Anchor,
        )
        .unwrap();

        assert_eq!(summary.applied, 1);
        assert_eq!(summary.skipped.len(), 2);
        // 失敗もキャッシュされるので2回目は再処理しない
        assert_eq!(summary.engine_invocations, 2);
    }

    #[test]
    fn test_page_geometry_failure_aborts_batch() {
        let mut doc = RecordingDocument::letter(1);
        doc.fail_geometry = true;

        let result = composite(
            &mut doc,
            &[placement("alice", 0)],
            &source(),
            &BATCH,
            30,
            BackgroundSampling::Anchor,
        );

        assert!(matches!(result, Err(SignError::DocumentError(_))));
    }

    #[test]
    fn test_rect_follows_coordinate_transform() {
        let mut doc = RecordingDocument::letter(1);
        composite(
            &mut doc,
            &[placement("alice", 0)],
            &source(),
            &BATCH,
            30,
            BackgroundSampling::Anchor,
        )
        .unwrap();

        let (page, rect) = doc.embedded[0];
        assert_eq!(page, 0);
        assert!((rect.x0 - 76.5).abs() < 0.01);
        assert!((rect.y0 - 692.52).abs() < 0.01);
        assert!((rect.y1 - 753.74).abs() < 0.01);
    }
}
