// ジョブ単位: PDF読込 -> 配置合成 -> 出力PDF書き出し
//
// Opened → Accumulating → Finalized。途中で失敗した場合は出力ファイルを残さない。

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::read_capped;
use crate::config::request::SignRequest;
use crate::pdf::document::PdfDocument;
use crate::pdf::optimizer::SaveOptions;
use crate::pipeline::compositor::{CompositeSummary, SkippedPlacement, composite};
use crate::pipeline::signature_source::{SignatureFiles, SignatureSource};
use crate::transparency::chroma_key::convert_signature;
use crate::transparency::reference::BackgroundSampling;

/// Configuration for a single signing job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub request_path: PathBuf,
    /// signatureId → image path
    pub signatures: HashMap<String, PathBuf>,
    pub tolerance: u8,
    pub background_sampling: BackgroundSampling,
    pub save_options: SaveOptions,
    pub max_input_bytes: u64,
}

/// Result of processing a single signing job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub placements_applied: usize,
    /// 合成時にスキップされた配置。
    pub skipped: Vec<SkippedPlacement>,
    /// JSON解析で除外された配置。
    ///
    /// `skipped` / `rejected` ともに index はリクエストJSON配列内の位置。
    pub rejected: Vec<SkippedPlacement>,
}

/// Configuration for a single background-removal conversion.
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub tolerance: u8,
    pub background_sampling: BackgroundSampling,
    pub max_input_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub bytes_written: usize,
}

/// メモリ上のPDFに配置リクエストを適用し、出力PDFのバイト列を返す。
///
/// 文書エラーの場合は部分的な出力を返さない。
pub fn sign_document<S: SignatureSource + ?Sized>(
    pdf_bytes: &[u8],
    request: &SignRequest,
    source: &S,
    tolerance: u8,
    sampling: BackgroundSampling,
    options: SaveOptions,
) -> crate::error::Result<(Vec<u8>, CompositeSummary)> {
    let mut document = PdfDocument::open(pdf_bytes)?;
    let summary = composite(
        &mut document,
        &request.placements,
        source,
        &request.batch,
        tolerance,
        sampling,
    )?;
    let output = document.serialize(options)?;
    Ok((output, summary))
}

/// 一時ファイルに書き込んでからリネームする。失敗時は一時ファイルごと破棄される。
fn write_atomically(path: &Path, bytes: &[u8]) -> crate::error::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// Run a single signing job.
pub fn run_job(config: &JobConfig) -> crate::error::Result<JobResult> {
    // リクエストの検証は文書を開く前に行う
    let request = SignRequest::from_file(&config.request_path, config.max_input_bytes)?;
    let input = read_capped(&config.input_path, config.max_input_bytes)?;
    let source = SignatureFiles::new(config.signatures.clone(), config.max_input_bytes);

    let (output, summary) = sign_document(
        &input,
        &request,
        &source,
        config.tolerance,
        config.background_sampling,
        config.save_options,
    )?;
    write_atomically(&config.output_path, &output)?;

    let skipped: Vec<SkippedPlacement> = summary
        .skipped
        .into_iter()
        .map(|mut s| {
            s.index = request.wire_indices.get(s.index).copied().unwrap_or(s.index);
            s
        })
        .collect();

    tracing::info!(
        input = %config.input_path.display(),
        output = %config.output_path.display(),
        applied = summary.applied,
        skipped = skipped.len(),
        rejected = request.rejected.len(),
        "job finished"
    );

    Ok(JobResult {
        input_path: config.input_path.clone(),
        output_path: config.output_path.clone(),
        placements_applied: summary.applied,
        skipped,
        rejected: request.rejected,
    })
}

/// 署名画像1枚の背景を除去し、透過PNGとして書き出す。
pub fn run_conversion(config: &ConversionConfig) -> crate::error::Result<ConversionResult> {
    let input = read_capped(&config.input_path, config.max_input_bytes)?;
    let png = convert_signature(&input, config.tolerance, config.background_sampling)?;
    write_atomically(&config.output_path, &png)?;

    Ok(ConversionResult {
        input_path: config.input_path.clone(),
        output_path: config.output_path.clone(),
        bytes_written: png.len(),
    })
}
