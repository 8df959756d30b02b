// ページツリーの参照: ページID、ページボックス（継承を考慮）

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::SignError;

/// PDFの一般的な上限 (14,400 pt ≈ 200 in)。
const PDF_MAX_DIMENSION_PT: f64 = 14_400.0;

/// Parent をたどる深さの上限（循環参照対策）。
const MAX_INHERITANCE_DEPTH: usize = 32;

/// 表示に使われるページボックス。`llx`/`lly` は左下隅の座標。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub width: f64,
    pub height: f64,
}

/// ページ番号(0-indexed)からObjectIdを取得する。
pub fn page_id(doc: &Document, page_index: u32) -> crate::error::Result<ObjectId> {
    let page_num = page_index
        .checked_add(1)
        .ok_or_else(|| SignError::document("page index overflow"))?;
    doc.get_pages().get(&page_num).copied().ok_or_else(|| {
        SignError::document(format!(
            "page {} not found (document has {} pages)",
            page_index,
            doc.get_pages().len()
        ))
    })
}

/// ページ辞書のキーを、Parent経由の継承も考慮して探す。
pub fn inherited_attribute<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = dict;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(obj) = current.get(key) {
            return Some(obj);
        }
        let Ok(Object::Reference(parent_id)) = current.get(b"Parent") else {
            return None;
        };
        current = doc.get_dictionary(*parent_id).ok()?;
    }
    None
}

fn to_f64(obj: &Object) -> crate::error::Result<f64> {
    match obj {
        Object::Integer(i) => Ok(*i as f64),
        Object::Real(f) => Ok(*f as f64),
        _ => Err(SignError::document("Invalid page box value")),
    }
}

/// ボックス配列の角の座標 `[x0, y0, x1, y1]` を正規化（左下・右上）して返す。
fn box_corners(doc: &Document, obj: &Object) -> crate::error::Result<[f64; 4]> {
    // ボックスは間接参照の場合もある
    let array = match obj {
        Object::Reference(id) => doc.get_object(*id)?.as_array()?,
        other => other.as_array()?,
    };
    if array.len() < 4 {
        return Err(SignError::document("Invalid page box"));
    }

    let x0 = to_f64(&array[0])?;
    let y0 = to_f64(&array[1])?;
    let x1 = to_f64(&array[2])?;
    let y1 = to_f64(&array[3])?;
    if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
        return Err(SignError::document("Invalid page box value"));
    }
    Ok([x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)])
}

fn to_page_box(corners: [f64; 4]) -> crate::error::Result<PageBox> {
    let [llx, lly, urx, ury] = corners;
    let width = urx - llx;
    let height = ury - lly;

    if width <= 0.0 || height <= 0.0 {
        return Err(SignError::document(
            "Invalid page box: non-positive page dimensions",
        ));
    }
    if width > PDF_MAX_DIMENSION_PT || height > PDF_MAX_DIMENSION_PT {
        return Err(SignError::document(
            "Invalid page box: page dimensions exceed PDF limits",
        ));
    }

    Ok(PageBox {
        llx,
        lly,
        width,
        height,
    })
}

/// 2つのボックスの共通部分。重ならなければ `None`。
fn intersect(a: [f64; 4], b: [f64; 4]) -> Option<[f64; 4]> {
    let llx = a[0].max(b[0]);
    let lly = a[1].max(b[1]);
    let urx = a[2].min(b[2]);
    let ury = a[3].min(b[3]);
    (urx > llx && ury > lly).then_some([llx, lly, urx, ury])
}

/// 表示領域のページボックスを返す。
///
/// CropBoxはMediaBoxとの共通部分を使う。CropBoxが壊れている、
/// またはMediaBoxと重ならない場合はMediaBoxを使う。
pub fn page_box(doc: &Document, page_id: ObjectId) -> crate::error::Result<PageBox> {
    let page_dict = doc.get_dictionary(page_id)?;

    let media_obj = inherited_attribute(doc, page_dict, b"MediaBox")
        .ok_or_else(|| SignError::document("MediaBox not found"))?;
    let media = box_corners(doc, media_obj)?;

    let Some(crop_obj) = inherited_attribute(doc, page_dict, b"CropBox") else {
        return to_page_box(media);
    };
    match box_corners(doc, crop_obj) {
        Ok(crop) => match intersect(crop, media) {
            Some(visible) => to_page_box(visible),
            None => {
                tracing::warn!(?page_id, "CropBox outside MediaBox, using MediaBox");
                to_page_box(media)
            }
        },
        Err(e) => {
            tracing::warn!(?page_id, error = %e, "unreadable CropBox, using MediaBox");
            to_page_box(media)
        }
    }
}

/// 表示時の回転角 (`/Rotate`、継承あり) を 0/90/180/270 に正規化して返す。
///
/// 90の倍数でない値は無視して0とする。
pub fn page_rotation(doc: &Document, page_id: ObjectId) -> crate::error::Result<u16> {
    let page_dict = doc.get_dictionary(page_id)?;
    let raw = match inherited_attribute(doc, page_dict, b"Rotate") {
        Some(Object::Integer(i)) => *i,
        Some(Object::Real(f)) if f.fract() == 0.0 => *f as i64,
        Some(Object::Reference(id)) => doc.get_object(*id)?.as_i64().unwrap_or(0),
        _ => 0,
    };
    let normalized = raw.rem_euclid(360);
    if normalized % 90 != 0 {
        tracing::warn!(?page_id, rotate = raw, "ignoring /Rotate that is not a multiple of 90");
        return Ok(0);
    }
    // 0..360 の範囲なので u16 に収まる
    Ok(normalized as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn doc_with_page(page: Dictionary, pages_extra: Dictionary) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut page = page;
        page.set("Type", "Page");
        page.set("Parent", pages_id);
        let page_id = doc.add_object(page);

        let mut pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        };
        for (k, v) in pages_extra.iter() {
            pages.set(k.clone(), v.clone());
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        (doc, page_id)
    }

    #[test]
    fn test_media_box_on_page() {
        let (doc, page_id) = doc_with_page(
            dictionary! { "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()] },
            dictionary! {},
        );
        let b = page_box(&doc, page_id).unwrap();
        assert_eq!(b, PageBox { llx: 0.0, lly: 0.0, width: 612.0, height: 792.0 });
    }

    #[test]
    fn test_media_box_inherited_from_parent() {
        let (doc, page_id) = doc_with_page(
            dictionary! {},
            dictionary! { "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()] },
        );
        let b = page_box(&doc, page_id).unwrap();
        assert_eq!((b.width, b.height), (595.0, 842.0));
    }

    #[test]
    fn test_crop_box_wins_over_media_box() {
        let (doc, page_id) = doc_with_page(
            dictionary! {
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "CropBox" => vec![10.into(), 20.into(), 310.into(), 420.into()],
            },
            dictionary! {},
        );
        let b = page_box(&doc, page_id).unwrap();
        assert_eq!(b, PageBox { llx: 10.0, lly: 20.0, width: 300.0, height: 400.0 });
    }

    #[test]
    fn test_missing_media_box_is_document_error() {
        let (doc, page_id) = doc_with_page(dictionary! {}, dictionary! {});
        assert!(matches!(
            page_box(&doc, page_id),
            Err(SignError::DocumentError(_))
        ));
    }

    #[test]
    fn test_crop_box_clipped_to_media_box() {
        let (doc, page_id) = doc_with_page(
            dictionary! {
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "CropBox" => vec![(-100).into(), (-100).into(), 1000.into(), 1000.into()],
            },
            dictionary! {},
        );
        let b = page_box(&doc, page_id).unwrap();
        assert_eq!(b, PageBox { llx: 0.0, lly: 0.0, width: 612.0, height: 792.0 });
    }

    #[test]
    fn test_crop_box_partial_overlap() {
        let (doc, page_id) = doc_with_page(
            dictionary! { "CropBox" => vec![300.into(), 400.into(), 900.into(), 1000.into()] },
            dictionary! { "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()] },
        );
        let b = page_box(&doc, page_id).unwrap();
        assert_eq!(b, PageBox { llx: 300.0, lly: 400.0, width: 312.0, height: 392.0 });
    }

    #[test]
    fn test_disjoint_crop_box_falls_back_to_media_box() {
        let (doc, page_id) = doc_with_page(
            dictionary! {
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "CropBox" => vec![700.into(), 800.into(), 900.into(), 1000.into()],
            },
            dictionary! {},
        );
        let b = page_box(&doc, page_id).unwrap();
        assert_eq!((b.width, b.height), (612.0, 792.0));
    }

    #[test]
    fn test_unreadable_crop_box_falls_back_to_media_box() {
        let (doc, page_id) = doc_with_page(
            dictionary! {
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "CropBox" => vec![0.into(), "bogus".into()],
            },
            dictionary! {},
        );
        let b = page_box(&doc, page_id).unwrap();
        assert_eq!((b.width, b.height), (612.0, 792.0));
    }

    #[test]
    fn test_oversized_media_box_is_rejected() {
        let (doc, page_id) = doc_with_page(
            dictionary! { "MediaBox" => vec![0.into(), 0.into(), 20000.into(), 792.into()] },
            dictionary! {},
        );
        assert!(matches!(
            page_box(&doc, page_id),
            Err(SignError::DocumentError(_))
        ));
    }

    #[test]
    fn test_page_rotation_normalized_and_inherited() {
        let cases: [(Option<i64>, u16); 6] = [
            (None, 0),
            (Some(90), 90),
            (Some(-90), 270),
            (Some(540), 180),
            (Some(45), 0),
            (Some(270), 270),
        ];
        for (rotate, expected) in cases {
            let pages_extra = match rotate {
                Some(r) => dictionary! { "Rotate" => r },
                None => dictionary! {},
            };
            let (doc, page_id) = doc_with_page(dictionary! {}, pages_extra);
            assert_eq!(page_rotation(&doc, page_id).unwrap(), expected, "{rotate:?}");
        }
    }

    #[test]
    fn test_page_rotation_on_page_overrides_parent() {
        let (doc, page_id) = doc_with_page(
            dictionary! { "Rotate" => 180 },
            dictionary! { "Rotate" => 90 },
        );
        assert_eq!(page_rotation(&doc, page_id).unwrap(), 180);
    }

    #[test]
    fn test_page_id_out_of_range() {
        let (doc, _) = doc_with_page(
            dictionary! { "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()] },
            dictionary! {},
        );
        assert!(page_id(&doc, 0).is_ok());
        assert!(page_id(&doc, 1).is_err());
    }
}
