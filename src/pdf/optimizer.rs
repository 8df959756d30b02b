// 保存前の最適化: FlateDecode圧縮、孤立オブジェクト除去

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::{Document, Object, ObjectId};

/// 保存時のオプション。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// 未圧縮ストリームをFlateDecodeで圧縮する。
    pub compress: bool,
    /// どこからも参照されないオブジェクトを除去する。
    pub prune_objects: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            compress: true,
            prune_objects: true,
        }
    }
}

/// zlib (FlateDecode) で圧縮する。
pub(crate) fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// ドキュメント内の未圧縮ストリームにFlateDecode圧縮を適用し、圧縮した数を返す。
///
/// 既にフィルターが設定されているストリームはスキップする（二重圧縮防止）。
/// 圧縮に失敗したストリームは元のまま残す。
pub fn compress_streams(doc: &mut Document) -> usize {
    let ids: Vec<ObjectId> = doc.objects.keys().copied().collect();
    let mut compressed_count = 0;

    for id in ids {
        let Some(Object::Stream(stream)) = doc.objects.get_mut(&id) else {
            continue;
        };
        if stream.dict.get(b"Filter").is_ok() {
            continue;
        }

        match deflate(&stream.content) {
            Ok(compressed) => {
                stream.dict.set("Filter", "FlateDecode");
                stream.set_content(compressed);
                compressed_count += 1;
            }
            Err(e) => {
                tracing::debug!(?id, error = %e, "stream left uncompressed");
            }
        }
    }
    compressed_count
}

/// オプションに従って最適化パスを実行する。
///
/// 1. 孤立オブジェクトを除去
/// 2. 未圧縮ストリームを圧縮
pub fn optimize(doc: &mut Document, options: &SaveOptions) {
    if options.prune_objects {
        let pruned = doc.prune_objects();
        tracing::debug!(count = pruned.len(), "pruned unreferenced objects");
    }
    if options.compress {
        let count = compress_streams(doc);
        tracing::debug!(count, "compressed streams");
    }
}
