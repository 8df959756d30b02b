pub mod job;
pub mod merged;
pub mod request;
pub mod settings;

use settings::Settings;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::SignError;

/// ジョブファイルのパスからsettings.yamlを自動検出して読み込む。
///
/// ジョブファイルと同じディレクトリに `settings.yaml` が存在すれば読み込み、
/// 存在しなければデフォルト設定を返す。
pub fn load_settings_for_job(job_file_path: &Path) -> crate::error::Result<Settings> {
    let dir = job_file_path
        .parent()
        .ok_or_else(|| SignError::config("Cannot determine job file directory"))?;

    let settings_path = dir.join("settings.yaml");

    if settings_path.exists() {
        Settings::from_file(&settings_path)
    } else {
        Ok(Settings::default())
    }
}

/// Resolve a potentially relative path against a base directory.
/// If the path is already absolute, return it as-is.
pub fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

/// ファイルを読み込む。`max_bytes` を超える場合は `ValidationError`。
pub fn read_capped(path: &Path, max_bytes: u64) -> crate::error::Result<Vec<u8>> {
    let file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    // 上限+1バイトまで読めたら超過
    file.take(max_bytes.saturating_add(1))
        .read_to_end(&mut bytes)?;
    if bytes.len() as u64 > max_bytes {
        return Err(SignError::validation(format!(
            "{} exceeds the input size limit of {max_bytes} bytes",
            path.display()
        )));
    }
    Ok(bytes)
}
