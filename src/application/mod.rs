pub mod ledger;
pub mod producer;
pub mod worker;

pub use ledger::{JobLedger, JobState};
pub use producer::Producer;
pub use worker::{JobStage, WorkerPool};
