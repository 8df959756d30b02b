// バッチ単位のメモリキャッシュ: signatureId → 背景除去済み画像
//
// Lives exactly as long as one composite call; nothing persists across batches.

use std::collections::HashMap;

use super::ProcessedSignature;
use super::hash::image_digest;
use crate::error::SignError;
use crate::pipeline::signature_source::SignatureSource;
use crate::transparency::chroma_key::remove_background;
use crate::transparency::png::encode_rgba_to_png;
use crate::transparency::reference::BackgroundSampling;

enum CacheEntry {
    Ready(ProcessedSignature),
    /// 処理に失敗したIDも記録し、同じバッチ内で再処理しない。
    Failed(String),
}

/// 署名IDごとに背景除去を高々1回だけ実行するキャッシュ。
pub struct ProcessedSignatureCache {
    tolerance: u8,
    sampling: BackgroundSampling,
    entries: HashMap<String, CacheEntry>,
    invocations: usize,
    hits: usize,
}

impl ProcessedSignatureCache {
    pub fn new(tolerance: u8, sampling: BackgroundSampling) -> Self {
        Self {
            tolerance,
            sampling,
            entries: HashMap::new(),
            invocations: 0,
            hits: 0,
        }
    }

    /// 処理済み画像を返す。未処理なら `source` から取得して背景除去を実行する。
    ///
    /// 失敗結果もキャッシュされ、2回目以降は同じ理由の `ProcessingError` を返す。
    pub fn resolve<S: SignatureSource + ?Sized>(
        &mut self,
        signature_id: &str,
        source: &S,
    ) -> crate::error::Result<&ProcessedSignature> {
        if self.entries.contains_key(signature_id) {
            self.hits += 1;
            tracing::debug!(signature_id, "processed signature cache hit");
        } else {
            let entry = self.process(signature_id, source);
            self.entries.insert(signature_id.to_string(), entry);
        }

        match self.entries.get(signature_id) {
            Some(CacheEntry::Ready(sig)) => Ok(sig),
            Some(CacheEntry::Failed(reason)) => Err(SignError::processing(reason.clone())),
            None => Err(SignError::internal(format!(
                "cache entry for '{signature_id}' vanished"
            ))),
        }
    }

    fn process<S: SignatureSource + ?Sized>(&mut self, signature_id: &str, source: &S) -> CacheEntry {
        let raw = match source.get(signature_id) {
            Ok(raw) => raw,
            Err(e) => {
                return CacheEntry::Failed(format!(
                    "signature '{signature_id}' could not be read: {e}"
                ));
            }
        };

        self.invocations += 1;
        let result = remove_background(&raw, self.tolerance, self.sampling)
            .and_then(|cutout| {
                let png = encode_rgba_to_png(&cutout.image)?;
                Ok(ProcessedSignature {
                    digest: image_digest(&png),
                    width: cutout.image.width(),
                    height: cutout.image.height(),
                    png,
                })
            });

        match result {
            Ok(sig) => CacheEntry::Ready(sig),
            Err(e) => CacheEntry::Failed(format!("signature '{signature_id}': {e}")),
        }
    }

    /// 背景除去エンジンの実行回数。
    pub fn invocations(&self) -> usize {
        self.invocations
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::collections::HashMap;

    fn sample_png() -> Vec<u8> {
        let mut img = RgbaImage::from_pixel(8, 4, Rgba([255, 255, 255, 255]));
        img.put_pixel(4, 2, Rgba([0, 0, 0, 255]));
        encode_rgba_to_png(&img).unwrap()
    }

    #[test]
    fn test_same_id_processed_once() {
        let mut source = HashMap::new();
        source.insert("sig".to_string(), sample_png());
        let mut cache = ProcessedSignatureCache::new(30, BackgroundSampling::Anchor);

        let first = cache.resolve("sig", &source).expect("first").clone();
        let second = cache.resolve("sig", &source).expect("second").clone();

        assert_eq!(first, second);
        assert_eq!(cache.invocations(), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.entries.len(), 1);
        assert_eq!((first.width, first.height), (8, 4));
    }

    #[test]
    fn test_failure_is_cached() {
        let mut source = HashMap::new();
        source.insert("broken".to_string(), b"not an image".to_vec());
        let mut cache = ProcessedSignatureCache::new(30, BackgroundSampling::Anchor);

        assert!(cache.resolve("broken", &source).is_err());
        let err = cache.resolve("broken", &source).unwrap_err();
        assert!(matches!(err, SignError::ProcessingError(_)));
        assert_eq!(cache.invocations(), 1);
    }

    #[test]
    fn test_missing_source_entry_skips_engine() {
        let source: HashMap<String, Vec<u8>> = HashMap::new();
        let mut cache = ProcessedSignatureCache::new(30, BackgroundSampling::Anchor);

        assert!(cache.resolve("ghost", &source).is_err());
        assert_eq!(cache.invocations(), 0);
    }
}
