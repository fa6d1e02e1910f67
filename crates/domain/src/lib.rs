//! doqd Domain Layer
pub mod config;
pub mod errors;
pub mod protocol;
pub mod query;

pub use config::{CliOverrides, Config};
pub use errors::{DomainError, FailureScope};
pub use protocol::{DoqErrorCode, ProtocolIdentifiers};
pub use query::DoqQuery;
