pub mod queue;
pub mod result_store;

pub use queue::InMemoryJobQueue;
pub use result_store::InMemoryResultStore;
