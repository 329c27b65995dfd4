//! AWS API plumbing for quotaguard.
//!
//! This crate is the provider boundary of the limit checker. It carries:
//!
//! - **Paginated query walker** - walks marker-based provider APIs and
//!   concatenates all pages of a result set
//! - **Service API traits** - one trait per resource domain, one method per
//!   provider operation, so services inject fakes in tests
//! - **HTTP clients** - reqwest implementations of the API traits against the
//!   provider's JSON query endpoints, with throttling retry
//!
//! Usage collection and limit evaluation live in `quotaguard-checker`; this
//! crate only knows how to fetch provider-shaped responses.

pub mod providers;

pub use providers::{
    paginate_query, Deadline, HttpRdsConnector, PageSpec, ProviderError, RdsApi, RdsClient,
    RdsConnector,
};
