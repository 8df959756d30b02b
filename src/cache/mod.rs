pub mod hash;
pub mod store;

/// 背景除去済みの署名画像。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedSignature {
    /// Transparent PNG bytes.
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// SHA-256 of `png` (lowercase hex), used to share one image XObject per document.
    pub digest: String,
}
