//! Provider API abstractions.
//!
//! This module defines the shared error taxonomy, the paginated query walker
//! and the per-service API traits and clients.

pub mod query;
pub mod rds;
mod traits;

pub use traits::ProviderError;

pub use query::{paginate_query, Deadline, PageSpec};

// Re-export service clients
pub use rds::{HttpRdsConnector, RdsApi, RdsClient, RdsConnector};
