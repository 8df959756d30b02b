// 全ジョブ実行

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::error::SignError;
use crate::pipeline::job_runner::{
    ConversionConfig, ConversionResult, JobConfig, JobResult, run_conversion, run_job,
};

/// パニックを `InternalError` に変換する。内部状態はメッセージに含めない。
fn guarded<T>(f: impl FnOnce() -> crate::error::Result<T>) -> crate::error::Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("job panicked");
            Err(SignError::internal("unexpected failure"))
        }
    }
}

/// Run multiple jobs, collecting results.
/// One job failure does NOT prevent other jobs from running.
pub fn run_all_jobs(jobs: &[JobConfig]) -> Vec<crate::error::Result<JobResult>> {
    jobs.iter().map(|job| guarded(|| run_job(job))).collect()
}

/// Run multiple conversions, collecting results.
pub fn run_all_conversions(
    conversions: &[ConversionConfig],
) -> Vec<crate::error::Result<ConversionResult>> {
    conversions
        .iter()
        .map(|conversion| guarded(|| run_conversion(conversion)))
        .collect()
}
