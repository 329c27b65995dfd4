//! RDS API client implementation.
//!
//! Targets the RDS JSON query API (`?Action=...&Version=2014-10-31`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{RdsApi, RdsConnector};
use crate::providers::traits::ProviderError;

/// Default timeout for a single API request.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// RDS JSON query API version.
const API_VERSION: &str = "2014-10-31";

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Throttled requests are retried up to this many times.
const MAX_THROTTLE_RETRIES: u32 = 4;

/// Base backoff between throttle retries; doubles per attempt.
const THROTTLE_BACKOFF_BASE_MS: u64 = 250;

/// RDS API client.
#[derive(Clone)]
pub struct RdsClient {
    /// HTTP client.
    client: Client,
    /// AWS access key ID.
    #[allow(dead_code)]
    access_key_id: String,
    /// AWS secret access key.
    #[allow(dead_code)]
    secret_access_key: String,
    /// API endpoint for the configured region.
    endpoint: Url,
}

impl RdsClient {
    /// Create a new RDS client for a region.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or the region endpoint cannot be
    /// constructed.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: &str,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(ProviderError::Http)?;

        let endpoint = Url::parse(&format!("https://rds.{region}.amazonaws.com/"))
            .map_err(|e| ProviderError::Config(format!("bad region {region:?}: {e}")))?;

        Ok(Self {
            client,
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            endpoint,
        })
    }

    /// Point the client at a non-default endpoint (local stacks, tests).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Execute one query-API action, retrying throttled responses.
    ///
    /// Note: in production, use the aws-sigv4 crate for proper request
    /// signing.
    async fn query(
        &self,
        action: &'static str,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError> {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("Action", action);
            pairs.append_pair("Version", API_VERSION);
            for (name, value) in params {
                pairs.append_pair(name, value);
            }
        }

        let mut attempt = 0;
        loop {
            debug!(url = %url, action, "RDS API request");

            let response = self
                .client
                .get(url.clone())
                .header("Content-Type", "application/json")
                .header(
                    "X-Amz-Date",
                    chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string(),
                )
                .send()
                .await?;

            match Self::handle_response(action, response).await {
                Err(ProviderError::Throttled(message)) if attempt < MAX_THROTTLE_RETRIES => {
                    attempt += 1;
                    let backoff =
                        Duration::from_millis(THROTTLE_BACKOFF_BASE_MS << (attempt - 1));
                    warn!(
                        action,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        message,
                        "Throttled by RDS, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
                other => return other,
            }
        }
    }

    /// Map an HTTP response to a parsed body or a provider error.
    async fn handle_response(
        action: &'static str,
        response: reqwest::Response,
    ) -> Result<Value, ProviderError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse RDS response");
                ProviderError::Serialization(e)
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS || text.contains("Throttling") {
            return Err(ProviderError::Throttled(text));
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth {
                action: format!("rds:{action}"),
                message: text,
            });
        }

        Err(ProviderError::Api {
            status: status.as_u16(),
            message: text,
        })
    }
}

#[async_trait]
impl RdsApi for RdsClient {
    async fn describe_db_instances(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError> {
        self.query("DescribeDBInstances", params).await
    }

    async fn describe_db_snapshots(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError> {
        self.query("DescribeDBSnapshots", params).await
    }

    async fn describe_db_parameter_groups(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError> {
        self.query("DescribeDBParameterGroups", params).await
    }

    async fn describe_db_security_groups(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError> {
        self.query("DescribeDBSecurityGroups", params).await
    }

    async fn describe_db_subnet_groups(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError> {
        self.query("DescribeDBSubnetGroups", params).await
    }

    async fn describe_option_groups(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError> {
        self.query("DescribeOptionGroups", params).await
    }

    async fn describe_event_subscriptions(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError> {
        self.query("DescribeEventSubscriptions", params).await
    }

    async fn describe_reserved_db_instances(
        &self,
        params: &[(String, String)],
    ) -> Result<Value, ProviderError> {
        self.query("DescribeReservedDBInstances", params).await
    }
}

/// Connector producing reqwest-backed [`RdsClient`] handles.
pub struct HttpRdsConnector {
    access_key_id: String,
    secret_access_key: String,
}

impl HttpRdsConnector {
    /// Create a connector with static credentials.
    #[must_use]
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }
}

impl RdsConnector for HttpRdsConnector {
    fn connect(&self) -> Result<Arc<dyn RdsApi>, ProviderError> {
        self.connect_to_region(DEFAULT_REGION)
    }

    fn connect_to_region(&self, region: &str) -> Result<Arc<dyn RdsApi>, ProviderError> {
        debug!(region, "Connecting to RDS");
        let client = RdsClient::new(&self.access_key_id, &self.secret_access_key, region)?;
        Ok(Arc::new(client))
    }
}
