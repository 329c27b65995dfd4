//! Service contract and per-domain implementations.
//!
//! A service is one resource domain (RDS, EC2, ...) that declares its limits
//! and knows how to collect usage for them. The driver-facing surface is
//! exactly [`Service`]; everything else is internal to the implementations.

pub mod rds;

pub use rds::RdsService;

use std::collections::HashMap;

use async_trait::async_trait;
use quotaguard_cloud::ProviderError;

use crate::limit::Limit;

/// A usage-finder that failed during collection.
#[derive(Debug)]
pub struct FinderFailure {
    /// Resource-type family the finder collects.
    pub resource: &'static str,
    /// What went wrong.
    pub error: ProviderError,
}

/// Errors from a service collection run.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    /// Could not establish the provider connection. Fatal for this service's
    /// run; other services are unaffected.
    #[error("connection failed: {0}")]
    Connection(#[from] ProviderError),

    /// One or more usage-finders failed. Usage collected by the finders that
    /// succeeded remains attached to their limits; the failures name the
    /// resource types that were not collected.
    #[error("{service}: {} of {total} usage finders failed", .failures.len())]
    Partial {
        service: &'static str,
        total: usize,
        failures: Vec<FinderFailure>,
    },
}

/// The driver-facing contract of one resource domain.
///
/// A driver holds a set of these, connects each, triggers usage collection
/// and reads the limits back for evaluation. Independent service instances
/// share no mutable state, so a driver may run them concurrently.
#[async_trait]
pub trait Service: Send {
    /// Canonical service name (e.g. "RDS").
    fn service_name(&self) -> &'static str;

    /// Establish the provider connection once.
    ///
    /// Routes through the connector's region-aware path when a region is
    /// configured. A no-op when already connected: the existing handle is
    /// preserved and the connector is not re-invoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the connector cannot produce a handle.
    async fn connect(&mut self) -> Result<(), ProviderError>;

    /// The mapping from limit name to limit.
    ///
    /// Built on first call and memoized: every call returns the same mapping,
    /// so overrides applied through one borrow are visible through the next.
    fn get_limits(&mut self) -> &mut HashMap<String, Limit>;

    /// Collect usage for every declared limit.
    ///
    /// Connects if necessary, resets usage from the previous run, then runs
    /// each usage-finder sequentially. A finder failure does not stop the
    /// remaining finders.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::Connection`] if no connection could be made, or
    /// [`UsageError::Partial`] naming each finder that failed.
    async fn find_usage(&mut self) -> Result<(), UsageError>;

    /// The authorization actions this service's API calls require.
    ///
    /// Static declarative metadata for an external pre-flight checker;
    /// alphabetically stable, exhaustive, no extras.
    fn required_iam_permissions(&self) -> &'static [&'static str];

    /// Whether the last [`find_usage`](Self::find_usage) completed with every
    /// finder succeeding.
    fn have_usage(&self) -> bool;
}
