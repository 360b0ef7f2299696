pub mod error;
pub mod result;

pub use error::{ErrorCategory, PipelineError};
pub use result::Result;
