use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::SignError;
use crate::transparency::reference::BackgroundSampling;

/// 署名画像として受け付ける拡張子。
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub conversions: Vec<Conversion>,
}

/// PDFへの署名合成ジョブ。
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub input: String,
    pub output: String,
    /// signatureId → 画像パス
    #[serde(deserialize_with = "deserialize_signatures")]
    pub signatures: BTreeMap<String, String>,
    /// 配置リクエスト(JSON)のパス
    pub request: String,
    pub tolerance: Option<u8>,
    pub background_sampling: Option<BackgroundSampling>,
    pub compress: Option<bool>,
}

/// 署名画像1枚の背景除去ジョブ。出力は常にPNG。
#[derive(Debug, Clone, Deserialize)]
pub struct Conversion {
    #[serde(deserialize_with = "deserialize_image_path")]
    pub input: String,
    #[serde(deserialize_with = "deserialize_png_path")]
    pub output: String,
    pub tolerance: Option<u8>,
    pub background_sampling: Option<BackgroundSampling>,
}

impl JobFile {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        let job_file: JobFile = serde_yml::from_str(yaml)?;
        if job_file.jobs.is_empty() && job_file.conversions.is_empty() {
            return Err(SignError::config(
                "Job file must contain at least one job or conversion",
            ));
        }
        Ok(job_file)
    }
}

fn extension_of(path: &str) -> Option<String> {
    std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// 画像パスの拡張子が許可リストに含まれるか検証する（大文字小文字は区別しない）。
pub fn validate_image_extension(path: &str) -> crate::error::Result<()> {
    match extension_of(path) {
        Some(ext) if ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(SignError::config(format!(
            "Invalid signature image type: '{path}' (allowed: {})",
            ALLOWED_IMAGE_EXTENSIONS.join(", ")
        ))),
    }
}

fn deserialize_signatures<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let map = BTreeMap::<String, String>::deserialize(deserializer)?;
    if map.is_empty() {
        return Err(serde::de::Error::custom("signatures cannot be empty"));
    }
    for (id, path) in &map {
        if id.trim().is_empty() {
            return Err(serde::de::Error::custom("signature id cannot be empty"));
        }
        validate_image_extension(path).map_err(serde::de::Error::custom)?;
    }
    Ok(map)
}

fn deserialize_image_path<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    validate_image_extension(&s).map_err(serde::de::Error::custom)?;
    Ok(s)
}

fn deserialize_png_path<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if extension_of(&s).as_deref() != Some("png") {
        return Err(serde::de::Error::custom(format!(
            "conversion output must be a .png file, got '{s}'"
        )));
    }
    Ok(s)
}
