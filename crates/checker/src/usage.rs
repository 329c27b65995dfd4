//! Usage value object.

use std::cmp::Ordering;

use serde::Serialize;

/// One measured quantity for one resource instance.
///
/// Created by a usage-finder from one parsed API record, attached to exactly
/// one [`Limit`](crate::limit::Limit), and immutable after creation. The
/// total order is by value, ties broken by resource id, so sorted usage is
/// deterministic for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Usage {
    value: u64,
    resource_id: Option<String>,
    aws_type: Option<String>,
}

impl Usage {
    /// A usage of `value` with no resource id (account-level aggregate).
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self {
            value,
            resource_id: None,
            aws_type: None,
        }
    }

    /// Tag with the resource instance the value was measured on.
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Tag with the canonical resource-type name (e.g.
    /// "AWS::RDS::DBInstance").
    #[must_use]
    pub fn with_aws_type(mut self, aws_type: impl Into<String>) -> Self {
        self.aws_type = Some(aws_type.into());
        self
    }

    /// The measured quantity.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.value
    }

    /// The resource instance the value was measured on, if any.
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    /// The canonical resource-type tag, if any.
    #[must_use]
    pub fn aws_type(&self) -> Option<&str> {
        self.aws_type.as_deref()
    }
}

impl Ord for Usage {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.value, &self.resource_id, &self.aws_type).cmp(&(
            other.value,
            &other.resource_id,
            &other.aws_type,
        ))
    }
}

impl PartialOrd for Usage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.resource_id {
            Some(resource_id) => write!(f, "{}={}", resource_id, self.value),
            None => write!(f, "{}", self.value),
        }
    }
}
