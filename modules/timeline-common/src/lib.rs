pub mod types;
pub mod records;
pub mod request;
pub mod config;
pub mod error;

pub use types::*;
pub use records::*;
pub use request::TimelineRequest;
pub use config::Config;
pub use error::{FailureReason, Result, SourceFailure, TimelineError};
