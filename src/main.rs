use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pdf_signing::config::job::JobFile;
use pdf_signing::config::merged::MergedConfig;
use pdf_signing::config::{self, resolve_path};
use pdf_signing::pdf::optimizer::SaveOptions;
use pdf_signing::pipeline::job_runner::{ConversionConfig, JobConfig};
use pdf_signing::pipeline::orchestrator::{run_all_conversions, run_all_jobs};

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // RUST_LOG未設定時は自クレートのinfo以上
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pdf_signing=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: pdf_signing <jobs.yaml>...");
        eprintln!("  Place signature images onto PDF pages according to job files.");
        return if args.is_empty() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!("pdf_signing {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    init_logging();

    let mut job_configs: Vec<JobConfig> = Vec::new();
    let mut conversion_configs: Vec<ConversionConfig> = Vec::new();

    for job_file_arg in &args {
        let job_file_path = Path::new(job_file_arg);

        let settings = match config::load_settings_for_job(job_file_path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("ERROR: Failed to load settings for {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        let yaml_content = match std::fs::read_to_string(job_file_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("ERROR: Failed to read job file {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        let job_file = match JobFile::from_yaml(&yaml_content) {
            Ok(jf) => jf,
            Err(e) => {
                eprintln!("ERROR: Failed to parse job file {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        let job_dir = job_file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        for job in &job_file.jobs {
            let merged = MergedConfig::new(&settings, job);
            let signatures: HashMap<String, PathBuf> = job
                .signatures
                .iter()
                .map(|(id, path)| (id.clone(), resolve_path(&job_dir, path)))
                .collect();

            job_configs.push(JobConfig {
                input_path: resolve_path(&job_dir, &job.input),
                output_path: resolve_path(&job_dir, &job.output),
                request_path: resolve_path(&job_dir, &job.request),
                signatures,
                tolerance: merged.tolerance,
                background_sampling: merged.background_sampling,
                save_options: SaveOptions {
                    compress: merged.compress,
                    prune_objects: merged.prune_objects,
                },
                max_input_bytes: merged.max_input_bytes,
            });
        }

        for conversion in &job_file.conversions {
            let merged = MergedConfig::for_conversion(&settings, conversion);
            conversion_configs.push(ConversionConfig {
                input_path: resolve_path(&job_dir, &conversion.input),
                output_path: resolve_path(&job_dir, &conversion.output),
                tolerance: merged.tolerance,
                background_sampling: merged.background_sampling,
                max_input_bytes: merged.max_input_bytes,
            });
        }
    }

    let mut has_error = false;

    for (config, result) in conversion_configs.iter().zip(run_all_conversions(&conversion_configs)) {
        match result {
            Ok(r) => eprintln!(
                "OK: {} -> {} ({} bytes)",
                r.input_path.display(),
                r.output_path.display(),
                r.bytes_written
            ),
            Err(e) => {
                eprintln!(
                    "ERROR: {} -> {}: {e}",
                    config.input_path.display(),
                    config.output_path.display()
                );
                has_error = true;
            }
        }
    }

    for (config, result) in job_configs.iter().zip(run_all_jobs(&job_configs)) {
        match result {
            Ok(r) => {
                eprintln!(
                    "OK: {} -> {} ({} placements applied, {} skipped)",
                    r.input_path.display(),
                    r.output_path.display(),
                    r.placements_applied,
                    r.skipped.len() + r.rejected.len()
                );
                for s in r.rejected.iter().chain(r.skipped.iter()) {
                    eprintln!(
                        "  skipped #{} ({}): {}",
                        s.index,
                        s.placement_id
                            .as_deref()
                            .or(s.signature_id.as_deref())
                            .unwrap_or("-"),
                        s.reason
                    );
                }
            }
            Err(e) => {
                eprintln!(
                    "ERROR: {} -> {}: {e}",
                    config.input_path.display(),
                    config.output_path.display()
                );
                has_error = true;
            }
        }
    }

    if has_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
