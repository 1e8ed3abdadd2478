pub mod job;
pub mod pool;

pub use job::{JobOutcome, JobResult, SummaryJob};
pub use pool::{ShutdownHandle, WorkerPool};
