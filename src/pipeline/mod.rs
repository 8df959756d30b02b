pub mod compositor;
pub mod job_runner;
pub mod orchestrator;
pub mod signature_source;
