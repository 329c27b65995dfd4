//! Usage collection and limit evaluation against AWS service quotas.
//!
//! This crate turns raw provider API records into actionable findings:
//!
//! - [`Usage`] - one measured quantity for one resource instance
//! - [`Limit`] - a named, boundable quantity owning its usage and threshold
//!   configuration, with warning/critical evaluation
//! - [`Service`] - the driver-facing contract one resource domain implements;
//!   [`services::RdsService`] is the RDS implementation
//! - [`CheckerConfig`] - service-level threshold defaults plus per-limit
//!   overrides, loaded from TOML
//!
//! The provider plumbing (pagination, HTTP clients, the injectable API
//! traits) lives in `quotaguard-cloud`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use quotaguard_checker::{CheckerConfig, Service};
//! use quotaguard_checker::services::RdsService;
//! use quotaguard_cloud::HttpRdsConnector;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CheckerConfig::load("quotaguard.toml")?;
//!     let connector = Arc::new(HttpRdsConnector::new(key_id, secret));
//!
//!     let mut rds = RdsService::new(&config, connector);
//!     rds.find_usage().await?;
//!
//!     for limit in rds.get_limits().values_mut() {
//!         if !limit.check_thresholds() {
//!             for usage in limit.get_criticals() {
//!                 eprintln!("CRITICAL {}: {usage}", limit.name());
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod limit;
pub mod services;
pub mod usage;

pub use config::{CheckerConfig, ConfigError, ThresholdOverride};
pub use limit::{Limit, Threshold};
pub use services::{FinderFailure, Service, UsageError};
pub use usage::Usage;
