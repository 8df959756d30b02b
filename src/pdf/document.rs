// lopdf ドキュメントへの署名埋め込み

use std::collections::{HashMap, HashSet};

use lopdf::{Document, ObjectId};

use super::SignableDocument;
use super::image_xobject::add_png_xobject;
use super::optimizer::{SaveOptions, optimize};
use super::reader::{page_box, page_id, page_rotation};
use super::writer::{
    append_page_content, placement_content, placement_matrix, register_xobject,
    wrap_page_contents,
};
use crate::cache::ProcessedSignature;
use crate::error::SignError;
use crate::geometry::{PageGeometry, Rect};

/// XObject名の接頭辞（`Sig0`, `Sig1`, ...）。
const XOBJECT_NAME_PREFIX: &str = "Sig";

/// 署名を埋め込む対象のPDF。
///
/// 同じ画像（ダイジェストが一致）は1つのXObjectとして追加し、全配置から参照する。
pub struct PdfDocument {
    doc: Document,
    page_count: u32,
    /// `q … Q` で既存コンテンツを囲み済みのページ。
    wrapped_pages: HashSet<ObjectId>,
    xobjects_by_digest: HashMap<String, ObjectId>,
    /// (ページ, XObject) → リソース名
    names: HashMap<(ObjectId, ObjectId), String>,
}

impl PdfDocument {
    /// PDFバイト列を開く。壊れた入力は `DocumentError`。
    pub fn open(bytes: &[u8]) -> crate::error::Result<Self> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| SignError::document(format!("cannot open PDF: {e}")))?;
        let page_count = u32::try_from(doc.get_pages().len())
            .map_err(|_| SignError::document("too many pages"))?;
        tracing::debug!(page_count, "opened PDF");
        Ok(Self {
            doc,
            page_count,
            wrapped_pages: HashSet::new(),
            xobjects_by_digest: HashMap::new(),
            names: HashMap::new(),
        })
    }

    /// 埋め込み済みの画像XObjectの数。
    pub fn embedded_image_count(&self) -> usize {
        self.xobjects_by_digest.len()
    }

    /// 最適化してバイト列に書き出す。`self` を消費する（Finalized以降は変更不可）。
    pub fn serialize(mut self, options: SaveOptions) -> crate::error::Result<Vec<u8>> {
        optimize(&mut self.doc, &options);
        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| SignError::document(format!("cannot write PDF: {e}")))?;
        Ok(buf)
    }

    fn xobject_for(&mut self, image: &ProcessedSignature) -> crate::error::Result<ObjectId> {
        if let Some(&id) = self.xobjects_by_digest.get(&image.digest) {
            return Ok(id);
        }
        let id = add_png_xobject(&mut self.doc, &image.png)?;
        self.xobjects_by_digest.insert(image.digest.clone(), id);
        Ok(id)
    }

    fn name_on_page(&mut self, page: ObjectId, xobject: ObjectId) -> crate::error::Result<String> {
        if let Some(name) = self.names.get(&(page, xobject)) {
            return Ok(name.clone());
        }
        let name = register_xobject(&mut self.doc, page, xobject, XOBJECT_NAME_PREFIX)?;
        self.names.insert((page, xobject), name.clone());
        Ok(name)
    }
}

impl SignableDocument for PdfDocument {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    /// 表示上のページサイズ。`/Rotate` が 90/270 なら幅と高さを入れ替える。
    fn page_geometry(&self, page_index: u32) -> crate::error::Result<PageGeometry> {
        let id = page_id(&self.doc, page_index)?;
        let b = page_box(&self.doc, id)?;
        let (width_units, height_units) = match page_rotation(&self.doc, id)? {
            90 | 270 => (b.height, b.width),
            _ => (b.width, b.height),
        };
        Ok(PageGeometry {
            width_units,
            height_units,
        })
    }

    fn embed_image(
        &mut self,
        page_index: u32,
        rect: &Rect,
        image: &ProcessedSignature,
    ) -> crate::error::Result<()> {
        if !(rect.width() > 0.0 && rect.height() > 0.0)
            || ![rect.x0, rect.y0, rect.x1, rect.y1]
                .iter()
                .all(|v| v.is_finite())
        {
            return Err(SignError::document(format!("invalid target rect {rect:?}")));
        }

        let page = page_id(&self.doc, page_index)?;
        // 矩形は表示上のページボックス左下が原点。回転とボックス原点はここで戻す
        let b = page_box(&self.doc, page)?;
        let matrix = placement_matrix(rect, &b, page_rotation(&self.doc, page)?);

        let xobject = self.xobject_for(image)?;
        let name = self.name_on_page(page, xobject)?;

        if self.wrapped_pages.insert(page) {
            wrap_page_contents(&mut self.doc, page)?;
        }
        append_page_content(&mut self.doc, page, placement_content(&name, &matrix))?;
        Ok(())
    }
}
