//! RDS (Relational Database Service) provider API.
//!
//! Defines the injectable API seam for RDS:
//!
//! - [`RdsApi`] - one async method per provider operation, returning the raw
//!   provider-shaped JSON so the paginated query walker can navigate it
//! - [`RdsConnector`] - builds API handles, with a region-aware path
//! - [`RdsClient`] - the reqwest implementation

mod client;
mod models;

pub use client::{HttpRdsConnector, RdsClient};
pub use models::*;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::providers::traits::ProviderError;

/// The RDS operations the limit checker performs.
///
/// Each method makes one network call for one page and returns the nested,
/// provider-shaped response. `params` carries the page's query parameters
/// (empty for the first page, the continuation marker afterwards). Tests
/// substitute a fake implementation instead of patching client internals.
#[async_trait]
pub trait RdsApi: Send + Sync {
    /// `DescribeDBInstances`
    async fn describe_db_instances(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError>;

    /// `DescribeDBSnapshots`
    async fn describe_db_snapshots(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError>;

    /// `DescribeDBParameterGroups`
    async fn describe_db_parameter_groups(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError>;

    /// `DescribeDBSecurityGroups`
    async fn describe_db_security_groups(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError>;

    /// `DescribeDBSubnetGroups`
    async fn describe_db_subnet_groups(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError>;

    /// `DescribeOptionGroups`
    async fn describe_option_groups(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError>;

    /// `DescribeEventSubscriptions`
    async fn describe_event_subscriptions(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError>;

    /// `DescribeReservedDBInstances`
    async fn describe_reserved_db_instances(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError>;
}

/// Builds RDS API handles.
///
/// Services hold a connector rather than a concrete client so that tests can
/// count connection attempts and inject fakes. `connect` targets the default
/// region; `connect_to_region` is the region-aware path a service must route
/// through when a region is configured.
pub trait RdsConnector: Send + Sync {
    /// Connect to the default region.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be constructed.
    fn connect(&self) -> Result<Arc<dyn RdsApi>, ProviderError>;

    /// Connect to a specific region.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be constructed.
    fn connect_to_region(&self, region: &str) -> Result<Arc<dyn RdsApi>, ProviderError>;
}
