pub mod job_queue;
pub mod result_store;
pub mod vulnerability_source;

pub use job_queue::{Delivery, JobQueue, QueueStatus};
pub use result_store::ResultStore;
pub use vulnerability_source::{VulnerabilityPage, VulnerabilitySource};
