// SHA-256（処理済みPNGバイト列）
//
// The digest identifies identical processed images so the PDF writer can
// reuse a single image XObject for every placement that shows them.

use sha2::{Digest, Sha256};

/// 画像バイト列の SHA-256 を小文字16進数で返す。
pub fn image_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
