pub mod document;
pub mod image_xobject;
pub mod optimizer;
pub mod reader;
pub mod writer;

use crate::cache::ProcessedSignature;
use crate::geometry::{PageGeometry, Rect};

/// 署名を合成できるドキュメント。コンポジタはこのトレイトを介してのみ文書に触れる。
///
/// ここから返るエラーはすべてバッチ全体を中断させる。
pub trait SignableDocument {
    fn page_count(&self) -> u32;

    /// ページの表示サイズ（ポイント、左下原点）。
    fn page_geometry(&self, page_index: u32) -> crate::error::Result<PageGeometry>;

    /// 処理済み画像を `rect`（ページ座標）に描画する。
    fn embed_image(
        &mut self,
        page_index: u32,
        rect: &Rect,
        image: &ProcessedSignature,
    ) -> crate::error::Result<()>;
}
