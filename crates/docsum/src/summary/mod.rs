pub mod client;
pub mod state;
pub mod worker;

pub use client::{ChatCompletionsSummarizer, Summarizer, SummarizerError, SummaryRequest};
pub use state::{ParseStatusError, SummaryStatus};
pub use worker::{SummaryWorker, WorkerSettings};
