// 署名画像の取得元: signatureId → 生の画像バイト列

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::SignError;

/// バッチ内で参照される署名画像の取得元。
pub trait SignatureSource {
    /// このバッチに `signature_id` が登録されているか。
    fn contains(&self, signature_id: &str) -> bool;

    /// 生の画像バイト列を返す。未登録のIDは `ValidationError`。
    fn get(&self, signature_id: &str) -> crate::error::Result<Cow<'_, [u8]>>;
}

impl SignatureSource for HashMap<String, Vec<u8>> {
    fn contains(&self, signature_id: &str) -> bool {
        self.contains_key(signature_id)
    }

    fn get(&self, signature_id: &str) -> crate::error::Result<Cow<'_, [u8]>> {
        HashMap::get(self, signature_id)
            .map(|bytes| Cow::Borrowed(bytes.as_slice()))
            .ok_or_else(|| unknown_signature(signature_id))
    }
}

fn unknown_signature(signature_id: &str) -> SignError {
    SignError::validation(format!(
        "signature '{signature_id}' is not registered for this batch"
    ))
}

/// ファイルから遅延読み込みする署名ソース。
///
/// 読み込みは `get` 呼び出し時。`max_bytes` を超えるファイルは拒否する。
pub struct SignatureFiles {
    paths: HashMap<String, PathBuf>,
    max_bytes: u64,
}

impl SignatureFiles {
    pub fn new(paths: HashMap<String, PathBuf>, max_bytes: u64) -> Self {
        Self { paths, max_bytes }
    }
}

impl SignatureSource for SignatureFiles {
    fn contains(&self, signature_id: &str) -> bool {
        self.paths.contains_key(signature_id)
    }

    fn get(&self, signature_id: &str) -> crate::error::Result<Cow<'_, [u8]>> {
        let path = self
            .paths
            .get(signature_id)
            .ok_or_else(|| unknown_signature(signature_id))?;
        let bytes = crate::config::read_capped(path, self.max_bytes)?;
        Ok(Cow::Owned(bytes))
    }
}
