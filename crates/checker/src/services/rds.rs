//! RDS service: declared limits and usage-finders.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quotaguard_cloud::providers::rds::{
    DbInstance, DbParameterGroup, DbSecurityGroup, DbSnapshot, DbSubnetGroup, EventSubscription,
    OptionGroup, ReservedDbInstance,
};
use quotaguard_cloud::{paginate_query, Deadline, PageSpec, ProviderError, RdsApi, RdsConnector};
use tracing::{debug, info, warn};

use crate::config::CheckerConfig;
use crate::limit::{Limit, Threshold};
use crate::services::{FinderFailure, Service, UsageError};
use crate::usage::Usage;

const SERVICE_NAME: &str = "RDS";

const RDS_INSTANCE: &str = "AWS::RDS::DBInstance";
const RDS_SNAPSHOT: &str = "AWS::RDS::DBSnapshot";
const RDS_PARAMETER_GROUP: &str = "AWS::RDS::DBParameterGroup";
const RDS_SECURITY_GROUP: &str = "AWS::RDS::DBSecurityGroup";
const RDS_SUBNET_GROUP: &str = "AWS::RDS::DBSubnetGroup";
const RDS_OPTION_GROUP: &str = "AWS::RDS::DBOptionGroup";
const RDS_EVENT_SUBSCRIPTION: &str = "AWS::RDS::EventSubscription";

/// One declared RDS limit.
///
/// The canonical names are the threshold-analysis-tool names; where the
/// provider documentation calls the quantity something else, `doc_name`
/// records it. This mapping is hand-maintained data - there is no general
/// rule to derive one set of names from the other.
struct LimitDef {
    name: &'static str,
    doc_name: Option<&'static str>,
    default_limit: u64,
    resource_type: &'static str,
}

const LIMIT_DEFS: &[LimitDef] = &[
    LimitDef {
        name: "DB instances",
        doc_name: Some("Instances"),
        default_limit: 40,
        resource_type: RDS_INSTANCE,
    },
    LimitDef {
        name: "Reserved Instances",
        doc_name: None,
        default_limit: 40,
        resource_type: RDS_INSTANCE,
    },
    LimitDef {
        name: "Storage quota (GB)",
        doc_name: Some("Total storage for all DB instances"),
        default_limit: 100_000,
        resource_type: RDS_INSTANCE,
    },
    LimitDef {
        name: "DB snapshots per user",
        doc_name: Some("Manual Snapshots"),
        default_limit: 50,
        resource_type: RDS_SNAPSHOT,
    },
    LimitDef {
        name: "DB parameter groups",
        doc_name: None,
        default_limit: 50,
        resource_type: RDS_PARAMETER_GROUP,
    },
    LimitDef {
        name: "DB security groups",
        doc_name: Some("Security Groups"),
        default_limit: 25,
        resource_type: RDS_SECURITY_GROUP,
    },
    LimitDef {
        name: "Max auths per security group",
        doc_name: None,
        default_limit: 20,
        resource_type: RDS_SECURITY_GROUP,
    },
    LimitDef {
        name: "VPC Security Groups",
        doc_name: None,
        default_limit: 5,
        resource_type: RDS_SECURITY_GROUP,
    },
    LimitDef {
        name: "Subnet Groups",
        doc_name: None,
        default_limit: 20,
        resource_type: RDS_SUBNET_GROUP,
    },
    LimitDef {
        name: "Subnets per Subnet Group",
        doc_name: None,
        default_limit: 20,
        resource_type: RDS_SUBNET_GROUP,
    },
    LimitDef {
        name: "Option Groups",
        doc_name: None,
        default_limit: 20,
        resource_type: RDS_OPTION_GROUP,
    },
    LimitDef {
        name: "Event Subscriptions",
        doc_name: None,
        default_limit: 20,
        resource_type: RDS_EVENT_SUBSCRIPTION,
    },
    LimitDef {
        name: "Read replicas per master",
        doc_name: None,
        default_limit: 5,
        resource_type: RDS_INSTANCE,
    },
];

const FINDER_COUNT: usize = 8;

/// Pagination shapes, verbatim from the provider's documented responses.
const INSTANCES: PageSpec = PageSpec {
    marker_path: &[
        "DescribeDBInstancesResponse",
        "DescribeDBInstancesResult",
        "Marker",
    ],
    data_path: &[
        "DescribeDBInstancesResponse",
        "DescribeDBInstancesResult",
        "DBInstances",
    ],
    marker_param: "Marker",
};

const SNAPSHOTS: PageSpec = PageSpec {
    marker_path: &[
        "DescribeDBSnapshotsResponse",
        "DescribeDBSnapshotsResult",
        "Marker",
    ],
    data_path: &[
        "DescribeDBSnapshotsResponse",
        "DescribeDBSnapshotsResult",
        "DBSnapshots",
    ],
    marker_param: "Marker",
};

const PARAMETER_GROUPS: PageSpec = PageSpec {
    marker_path: &[
        "DescribeDBParameterGroupsResponse",
        "DescribeDBParameterGroupsResult",
        "Marker",
    ],
    data_path: &[
        "DescribeDBParameterGroupsResponse",
        "DescribeDBParameterGroupsResult",
        "DBParameterGroups",
    ],
    marker_param: "Marker",
};

const SECURITY_GROUPS: PageSpec = PageSpec {
    marker_path: &[
        "DescribeDBSecurityGroupsResponse",
        "DescribeDBSecurityGroupsResult",
        "Marker",
    ],
    data_path: &[
        "DescribeDBSecurityGroupsResponse",
        "DescribeDBSecurityGroupsResult",
        "DBSecurityGroups",
    ],
    marker_param: "Marker",
};

const SUBNET_GROUPS: PageSpec = PageSpec {
    marker_path: &[
        "DescribeDBSubnetGroupsResponse",
        "DescribeDBSubnetGroupsResult",
        "Marker",
    ],
    data_path: &[
        "DescribeDBSubnetGroupsResponse",
        "DescribeDBSubnetGroupsResult",
        "DBSubnetGroups",
    ],
    marker_param: "Marker",
};

const OPTION_GROUPS: PageSpec = PageSpec {
    marker_path: &[
        "DescribeOptionGroupsResponse",
        "DescribeOptionGroupsResult",
        "Marker",
    ],
    data_path: &[
        "DescribeOptionGroupsResponse",
        "DescribeOptionGroupsResult",
        "OptionGroupsList",
    ],
    marker_param: "Marker",
};

const EVENT_SUBSCRIPTIONS: PageSpec = PageSpec {
    marker_path: &[
        "DescribeEventSubscriptionsResponse",
        "DescribeEventSubscriptionsResult",
        "Marker",
    ],
    data_path: &[
        "DescribeEventSubscriptionsResponse",
        "DescribeEventSubscriptionsResult",
        "EventSubscriptionsList",
    ],
    marker_param: "Marker",
};

const RESERVED_INSTANCES: PageSpec = PageSpec {
    marker_path: &[
        "DescribeReservedDBInstancesResponse",
        "DescribeReservedDBInstancesResult",
        "Marker",
    ],
    data_path: &[
        "DescribeReservedDBInstancesResponse",
        "DescribeReservedDBInstancesResult",
        "ReservedDBInstances",
    ],
    marker_param: "Marker",
};

const REQUIRED_IAM_PERMISSIONS: &[&str] = &[
    "rds:DescribeDBInstances",
    "rds:DescribeDBParameterGroups",
    "rds:DescribeDBSecurityGroups",
    "rds:DescribeDBSnapshots",
    "rds:DescribeDBSubnetGroups",
    "rds:DescribeEventSubscriptions",
    "rds:DescribeOptionGroups",
    "rds:DescribeReservedDBInstances",
];

/// The RDS resource domain.
pub struct RdsService {
    warning_threshold: Threshold,
    critical_threshold: Threshold,
    region: Option<String>,
    timeout: Option<Duration>,
    connector: Arc<dyn RdsConnector>,
    conn: Option<Arc<dyn RdsApi>>,
    limits: Option<HashMap<String, Limit>>,
    have_usage: bool,
}

impl RdsService {
    /// Create the service with its threshold defaults and connector.
    #[must_use]
    pub fn new(config: &CheckerConfig, connector: Arc<dyn RdsConnector>) -> Self {
        Self {
            warning_threshold: config.warning_threshold,
            critical_threshold: config.critical_threshold,
            region: config.region.clone(),
            timeout: config.timeout(),
            connector,
            conn: None,
            limits: None,
            have_usage: false,
        }
    }

    fn build_limits(warning: Threshold, critical: Threshold) -> HashMap<String, Limit> {
        LIMIT_DEFS
            .iter()
            .map(|def| {
                let mut limit = Limit::new(
                    def.name,
                    SERVICE_NAME,
                    Some(def.default_limit),
                    warning,
                    critical,
                )
                .with_resource_type(def.resource_type);
                if let Some(doc_name) = def.doc_name {
                    limit = limit.with_doc_name(doc_name);
                }
                (def.name.to_string(), limit)
            })
            .collect()
    }

    fn deadline(&self) -> Option<Deadline> {
        self.timeout.map(Deadline::after)
    }

    fn conn(&self) -> Result<Arc<dyn RdsApi>, ProviderError> {
        self.conn
            .clone()
            .ok_or_else(|| ProviderError::Config("RDS service is not connected".to_string()))
    }

    async fn find_usage_instances(
        conn: &Arc<dyn RdsApi>,
        limits: &mut HashMap<String, Limit>,
        deadline: Option<Deadline>,
    ) -> Result<(), ProviderError> {
        debug!("Getting usage for RDS instances");
        let api = Arc::clone(conn);
        let records = paginate_query(
            move |params| {
                let api = Arc::clone(&api);
                async move { api.describe_db_instances(&params).await }
            },
            &INSTANCES,
            deadline,
        )
        .await?;

        let count = records.len() as u64;
        let mut storage_gb = 0u64;
        for record in records {
            let instance: DbInstance = serde_json::from_value(record)?;
            storage_gb += instance.allocated_storage;
            attach(
                limits,
                "Read replicas per master",
                Usage::new(instance.read_replica_db_instance_identifiers.len() as u64)
                    .with_resource_id(instance.db_instance_identifier)
                    .with_aws_type(RDS_INSTANCE),
            );
        }

        attach(
            limits,
            "DB instances",
            Usage::new(count).with_aws_type(RDS_INSTANCE),
        );
        attach(
            limits,
            "Storage quota (GB)",
            Usage::new(storage_gb).with_aws_type(RDS_INSTANCE),
        );
        Ok(())
    }

    async fn find_usage_snapshots(
        conn: &Arc<dyn RdsApi>,
        limits: &mut HashMap<String, Limit>,
        deadline: Option<Deadline>,
    ) -> Result<(), ProviderError> {
        debug!("Getting usage for RDS snapshots");
        let api = Arc::clone(conn);
        let records = paginate_query(
            move |params| {
                let api = Arc::clone(&api);
                async move { api.describe_db_snapshots(&params).await }
            },
            &SNAPSHOTS,
            deadline,
        )
        .await?;

        // Only manual snapshots count against the quota.
        let mut manual = 0u64;
        for record in records {
            let snapshot: DbSnapshot = serde_json::from_value(record)?;
            if snapshot.snapshot_type == "manual" {
                manual += 1;
            }
        }

        attach(
            limits,
            "DB snapshots per user",
            Usage::new(manual).with_aws_type(RDS_SNAPSHOT),
        );
        Ok(())
    }

    async fn find_usage_param_groups(
        conn: &Arc<dyn RdsApi>,
        limits: &mut HashMap<String, Limit>,
        deadline: Option<Deadline>,
    ) -> Result<(), ProviderError> {
        debug!("Getting usage for RDS parameter groups");
        let api = Arc::clone(conn);
        let records = paginate_query(
            move |params| {
                let api = Arc::clone(&api);
                async move { api.describe_db_parameter_groups(&params).await }
            },
            &PARAMETER_GROUPS,
            deadline,
        )
        .await?;

        let mut count = 0u64;
        for record in records {
            let _group: DbParameterGroup = serde_json::from_value(record)?;
            count += 1;
        }

        attach(
            limits,
            "DB parameter groups",
            Usage::new(count).with_aws_type(RDS_PARAMETER_GROUP),
        );
        Ok(())
    }

    async fn find_usage_subnet_groups(
        conn: &Arc<dyn RdsApi>,
        limits: &mut HashMap<String, Limit>,
        deadline: Option<Deadline>,
    ) -> Result<(), ProviderError> {
        debug!("Getting usage for RDS subnet groups");
        let api = Arc::clone(conn);
        let records = paginate_query(
            move |params| {
                let api = Arc::clone(&api);
                async move { api.describe_db_subnet_groups(&params).await }
            },
            &SUBNET_GROUPS,
            deadline,
        )
        .await?;

        let count = records.len() as u64;
        for record in records {
            let group: DbSubnetGroup = serde_json::from_value(record)?;
            attach(
                limits,
                "Subnets per Subnet Group",
                Usage::new(group.subnets.len() as u64)
                    .with_resource_id(group.db_subnet_group_name)
                    .with_aws_type(RDS_SUBNET_GROUP),
            );
        }

        attach(
            limits,
            "Subnet Groups",
            Usage::new(count).with_aws_type(RDS_SUBNET_GROUP),
        );
        Ok(())
    }

    async fn find_usage_option_groups(
        conn: &Arc<dyn RdsApi>,
        limits: &mut HashMap<String, Limit>,
        deadline: Option<Deadline>,
    ) -> Result<(), ProviderError> {
        debug!("Getting usage for RDS option groups");
        let api = Arc::clone(conn);
        let records = paginate_query(
            move |params| {
                let api = Arc::clone(&api);
                async move { api.describe_option_groups(&params).await }
            },
            &OPTION_GROUPS,
            deadline,
        )
        .await?;

        let mut count = 0u64;
        for record in records {
            let _group: OptionGroup = serde_json::from_value(record)?;
            count += 1;
        }

        attach(
            limits,
            "Option Groups",
            Usage::new(count).with_aws_type(RDS_OPTION_GROUP),
        );
        Ok(())
    }

    async fn find_usage_event_subscriptions(
        conn: &Arc<dyn RdsApi>,
        limits: &mut HashMap<String, Limit>,
        deadline: Option<Deadline>,
    ) -> Result<(), ProviderError> {
        debug!("Getting usage for RDS event subscriptions");
        let api = Arc::clone(conn);
        let records = paginate_query(
            move |params| {
                let api = Arc::clone(&api);
                async move { api.describe_event_subscriptions(&params).await }
            },
            &EVENT_SUBSCRIPTIONS,
            deadline,
        )
        .await?;

        let mut count = 0u64;
        for record in records {
            let _subscription: EventSubscription = serde_json::from_value(record)?;
            count += 1;
        }

        attach(
            limits,
            "Event Subscriptions",
            Usage::new(count).with_aws_type(RDS_EVENT_SUBSCRIPTION),
        );
        Ok(())
    }

    async fn find_usage_security_groups(
        conn: &Arc<dyn RdsApi>,
        limits: &mut HashMap<String, Limit>,
        deadline: Option<Deadline>,
    ) -> Result<(), ProviderError> {
        debug!("Getting usage for RDS security groups");
        let api = Arc::clone(conn);
        let records = paginate_query(
            move |params| {
                let api = Arc::clone(&api);
                async move { api.describe_db_security_groups(&params).await }
            },
            &SECURITY_GROUPS,
            deadline,
        )
        .await?;

        let mut classic = 0u64;
        let mut vpc = 0u64;
        for record in records {
            let group: DbSecurityGroup = serde_json::from_value(record)?;
            if group.vpc_id.is_some() {
                vpc += 1;
            } else {
                classic += 1;
            }
            let auths = (group.ec2_security_groups.len() + group.ip_ranges.len()) as u64;
            attach(
                limits,
                "Max auths per security group",
                Usage::new(auths)
                    .with_resource_id(group.db_security_group_name)
                    .with_aws_type(RDS_SECURITY_GROUP),
            );
        }

        attach(
            limits,
            "DB security groups",
            Usage::new(classic).with_aws_type(RDS_SECURITY_GROUP),
        );
        attach(
            limits,
            "VPC Security Groups",
            Usage::new(vpc).with_aws_type(RDS_SECURITY_GROUP),
        );
        Ok(())
    }

    async fn find_usage_reserved_instances(
        conn: &Arc<dyn RdsApi>,
        limits: &mut HashMap<String, Limit>,
        deadline: Option<Deadline>,
    ) -> Result<(), ProviderError> {
        debug!("Getting usage for RDS reserved instances");
        let api = Arc::clone(conn);
        let records = paginate_query(
            move |params| {
                let api = Arc::clone(&api);
                async move { api.describe_reserved_db_instances(&params).await }
            },
            &RESERVED_INSTANCES,
            deadline,
        )
        .await?;

        let mut count = 0u64;
        for record in records {
            let _reserved: ReservedDbInstance = serde_json::from_value(record)?;
            count += 1;
        }

        attach(
            limits,
            "Reserved Instances",
            Usage::new(count).with_aws_type(RDS_INSTANCE),
        );
        Ok(())
    }
}

/// Attach a usage to a declared limit.
fn attach(limits: &mut HashMap<String, Limit>, name: &str, usage: Usage) {
    if let Some(limit) = limits.get_mut(name) {
        limit.add_current_usage(usage);
    }
}

#[async_trait]
impl Service for RdsService {
    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }

    async fn connect(&mut self) -> Result<(), ProviderError> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = match &self.region {
            Some(region) => self.connector.connect_to_region(region)?,
            None => self.connector.connect()?,
        };
        self.conn = Some(conn);
        Ok(())
    }

    fn get_limits(&mut self) -> &mut HashMap<String, Limit> {
        let warning = self.warning_threshold;
        let critical = self.critical_threshold;
        self.limits
            .get_or_insert_with(|| Self::build_limits(warning, critical))
    }

    async fn find_usage(&mut self) -> Result<(), UsageError> {
        info!(service = SERVICE_NAME, "Finding usage");
        self.connect().await?;
        self.have_usage = false;

        let conn = self.conn()?;
        let deadline = self.deadline();
        let limits = self.get_limits();
        for limit in limits.values_mut() {
            limit.reset_usage();
        }

        let mut failures = Vec::new();

        if let Err(error) = Self::find_usage_instances(&conn, limits, deadline).await {
            warn!(resource = "instances", error = %error, "RDS usage finder failed");
            failures.push(FinderFailure {
                resource: "instances",
                error,
            });
        }
        if let Err(error) = Self::find_usage_snapshots(&conn, limits, deadline).await {
            warn!(resource = "snapshots", error = %error, "RDS usage finder failed");
            failures.push(FinderFailure {
                resource: "snapshots",
                error,
            });
        }
        if let Err(error) = Self::find_usage_param_groups(&conn, limits, deadline).await {
            warn!(resource = "parameter groups", error = %error, "RDS usage finder failed");
            failures.push(FinderFailure {
                resource: "parameter groups",
                error,
            });
        }
        if let Err(error) = Self::find_usage_subnet_groups(&conn, limits, deadline).await {
            warn!(resource = "subnet groups", error = %error, "RDS usage finder failed");
            failures.push(FinderFailure {
                resource: "subnet groups",
                error,
            });
        }
        if let Err(error) = Self::find_usage_option_groups(&conn, limits, deadline).await {
            warn!(resource = "option groups", error = %error, "RDS usage finder failed");
            failures.push(FinderFailure {
                resource: "option groups",
                error,
            });
        }
        if let Err(error) = Self::find_usage_event_subscriptions(&conn, limits, deadline).await {
            warn!(resource = "event subscriptions", error = %error, "RDS usage finder failed");
            failures.push(FinderFailure {
                resource: "event subscriptions",
                error,
            });
        }
        if let Err(error) = Self::find_usage_security_groups(&conn, limits, deadline).await {
            warn!(resource = "security groups", error = %error, "RDS usage finder failed");
            failures.push(FinderFailure {
                resource: "security groups",
                error,
            });
        }
        if let Err(error) = Self::find_usage_reserved_instances(&conn, limits, deadline).await {
            warn!(resource = "reserved instances", error = %error, "RDS usage finder failed");
            failures.push(FinderFailure {
                resource: "reserved instances",
                error,
            });
        }

        if failures.is_empty() {
            self.have_usage = true;
            info!(service = SERVICE_NAME, "Usage collection complete");
            Ok(())
        } else {
            Err(UsageError::Partial {
                service: SERVICE_NAME,
                total: FINDER_COUNT,
                failures,
            })
        }
    }

    fn required_iam_permissions(&self) -> &'static [&'static str] {
        REQUIRED_IAM_PERMISSIONS
    }

    fn have_usage(&self) -> bool {
        self.have_usage
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::{json, Value};

    use super::*;

    /// Canned responses per operation, recording every call's parameters.
    #[derive(Default)]
    struct FakeRds {
        responses: HashMap<&'static str, Value>,
        calls: Mutex<Vec<(&'static str, Vec<(String, String)>)>>,
    }

    impl FakeRds {
        fn new() -> Self {
            Self::default()
        }

        fn with(mut self, action: &'static str, response: Value) -> Self {
            self.responses.insert(action, response);
            self
        }

        fn respond(
            &self,
            action: &'static str,
            params: &[(String, String)],
        ) -> Result<Value, ProviderError> {
            self.calls.lock().unwrap().push((action, params.to_vec()));
            self.responses.get(action).cloned().ok_or_else(|| {
                ProviderError::Api {
                    status: 500,
                    message: format!("no canned response for {action}"),
                }
            })
        }

        fn actions_called(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().iter().map(|(a, _)| *a).collect()
        }
    }

    #[async_trait]
    impl RdsApi for FakeRds {
        async fn describe_db_instances(
            &self,
            params: &[(String, String)],
        ) -> Result<Value, ProviderError> {
            self.respond("DescribeDBInstances", params)
        }

        async fn describe_db_snapshots(
            &self,
            params: &[(String, String)],
        ) -> Result<Value, ProviderError> {
            self.respond("DescribeDBSnapshots", params)
        }

        async fn describe_db_parameter_groups(
            &self,
            params: &[(String, String)],
        ) -> Result<Value, ProviderError> {
            self.respond("DescribeDBParameterGroups", params)
        }

        async fn describe_db_security_groups(
            &self,
            params: &[(String, String)],
        ) -> Result<Value, ProviderError> {
            self.respond("DescribeDBSecurityGroups", params)
        }

        async fn describe_db_subnet_groups(
            &self,
            params: &[(String, String)],
        ) -> Result<Value, ProviderError> {
            self.respond("DescribeDBSubnetGroups", params)
        }

        async fn describe_option_groups(
            &self,
            params: &[(String, String)],
        ) -> Result<Value, ProviderError> {
            self.respond("DescribeOptionGroups", params)
        }

        async fn describe_event_subscriptions(
            &self,
            params: &[(String, String)],
        ) -> Result<Value, ProviderError> {
            self.respond("DescribeEventSubscriptions", params)
        }

        async fn describe_reserved_db_instances(
            &self,
            params: &[(String, String)],
        ) -> Result<Value, ProviderError> {
            self.respond("DescribeReservedDBInstances", params)
        }
    }

    /// Connector handing out a shared fake API, counting invocations.
    struct FakeConnector {
        api: Arc<FakeRds>,
        connects: AtomicUsize,
        region_connects: Mutex<Vec<String>>,
    }

    impl FakeConnector {
        fn new(api: FakeRds) -> Self {
            Self {
                api: Arc::new(api),
                connects: AtomicUsize::new(0),
                region_connects: Mutex::new(Vec::new()),
            }
        }
    }

    impl RdsConnector for FakeConnector {
        fn connect(&self) -> Result<Arc<dyn RdsApi>, ProviderError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::clone(&self.api) as Arc<dyn RdsApi>)
        }

        fn connect_to_region(&self, region: &str) -> Result<Arc<dyn RdsApi>, ProviderError> {
            self.region_connects.lock().unwrap().push(region.to_string());
            Ok(Arc::clone(&self.api) as Arc<dyn RdsApi>)
        }
    }

    /// Provider-shaped response envelope for one operation.
    fn envelope(action: &str, data_key: &str, data: Value) -> Value {
        let mut result = serde_json::Map::new();
        result.insert(data_key.to_string(), data);
        let mut response = serde_json::Map::new();
        response.insert(format!("{action}Result"), Value::Object(result));
        let mut root = serde_json::Map::new();
        root.insert(format!("{action}Response"), Value::Object(response));
        Value::Object(root)
    }

    fn fake_with_empty_responses() -> FakeRds {
        FakeRds::new()
            .with("DescribeDBInstances", envelope("DescribeDBInstances", "DBInstances", json!([])))
            .with("DescribeDBSnapshots", envelope("DescribeDBSnapshots", "DBSnapshots", json!([])))
            .with(
                "DescribeDBParameterGroups",
                envelope("DescribeDBParameterGroups", "DBParameterGroups", json!([])),
            )
            .with(
                "DescribeDBSecurityGroups",
                envelope("DescribeDBSecurityGroups", "DBSecurityGroups", json!([])),
            )
            .with(
                "DescribeDBSubnetGroups",
                envelope("DescribeDBSubnetGroups", "DBSubnetGroups", json!([])),
            )
            .with(
                "DescribeOptionGroups",
                envelope("DescribeOptionGroups", "OptionGroupsList", json!([])),
            )
            .with(
                "DescribeEventSubscriptions",
                envelope("DescribeEventSubscriptions", "EventSubscriptionsList", json!([])),
            )
            .with(
                "DescribeReservedDBInstances",
                envelope("DescribeReservedDBInstances", "ReservedDBInstances", json!([])),
            )
    }

    fn service_with(api: FakeRds, region: Option<&str>) -> (RdsService, Arc<FakeConnector>) {
        let connector = Arc::new(FakeConnector::new(api));
        let config = CheckerConfig {
            warning_threshold: Threshold::Percent(21.0),
            critical_threshold: Threshold::Percent(43.0),
            region: region.map(str::to_string),
            ..CheckerConfig::default()
        };
        let service = RdsService::new(&config, Arc::clone(&connector) as Arc<dyn RdsConnector>);
        (service, connector)
    }

    fn test_limits() -> HashMap<String, Limit> {
        RdsService::build_limits(Threshold::Percent(21.0), Threshold::Percent(43.0))
    }

    fn sorted_usage(limits: &HashMap<String, Limit>, name: &str) -> Vec<Usage> {
        let mut usage = limits[name].get_current_usage().to_vec();
        usage.sort();
        usage
    }

    #[test]
    fn new_service_is_unconnected() {
        let (service, _connector) = service_with(FakeRds::new(), None);
        assert_eq!(service.service_name(), "RDS");
        assert!(service.conn.is_none());
        assert!(!service.have_usage());
        assert_eq!(service.warning_threshold, Threshold::Percent(21.0));
        assert_eq!(service.critical_threshold, Threshold::Percent(43.0));
    }

    #[tokio::test]
    async fn connect_uses_default_path_without_region() {
        let (mut service, connector) = service_with(FakeRds::new(), None);
        service.connect().await.unwrap();

        assert!(service.conn.is_some());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert!(connector.region_connects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn connect_routes_through_region_path() {
        let (mut service, connector) = service_with(FakeRds::new(), Some("foo"));
        service.connect().await.unwrap();

        assert!(service.conn.is_some());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
        assert_eq!(
            *connector.region_connects.lock().unwrap(),
            vec!["foo".to_string()]
        );
    }

    #[tokio::test]
    async fn connect_reuses_existing_handle() {
        let (mut service, connector) = service_with(FakeRds::new(), None);
        service.connect().await.unwrap();
        service.connect().await.unwrap();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_limits_declares_all_thirteen() {
        let (mut service, _connector) = service_with(FakeRds::new(), None);
        let limits = service.get_limits();

        let mut names: Vec<&str> = limits.keys().map(String::as_str).collect();
        names.sort_unstable();
        let mut expected = vec![
            "DB instances",
            "Max auths per security group",
            "Storage quota (GB)",
            "DB snapshots per user",
            "DB security groups",
            "Reserved Instances",
            "DB parameter groups",
            "VPC Security Groups",
            "Subnet Groups",
            "Subnets per Subnet Group",
            "Option Groups",
            "Event Subscriptions",
            "Read replicas per master",
        ];
        expected.sort_unstable();
        assert_eq!(names, expected);

        for limit in limits.values() {
            assert_eq!(limit.service_name(), "RDS");
            assert_eq!(limit.def_warning_threshold(), Threshold::Percent(21.0));
            assert_eq!(limit.def_critical_threshold(), Threshold::Percent(43.0));
        }
    }

    #[test]
    fn get_limits_preserves_doc_name_mapping() {
        let (mut service, _connector) = service_with(FakeRds::new(), None);
        let limits = service.get_limits();

        assert_eq!(limits["DB instances"].doc_name(), Some("Instances"));
        assert_eq!(
            limits["Storage quota (GB)"].doc_name(),
            Some("Total storage for all DB instances")
        );
        assert_eq!(
            limits["DB snapshots per user"].doc_name(),
            Some("Manual Snapshots")
        );
        assert_eq!(
            limits["DB security groups"].doc_name(),
            Some("Security Groups")
        );
        assert_eq!(limits["Read replicas per master"].doc_name(), None);
    }

    #[test]
    fn get_limits_is_memoized() {
        let (mut service, _connector) = service_with(FakeRds::new(), None);

        let first: *const HashMap<String, Limit> = service.get_limits();
        service
            .get_limits()
            .get_mut("DB instances")
            .unwrap()
            .set_limit_override(100);
        let second: *const HashMap<String, Limit> = service.get_limits();

        assert_eq!(first, second);
        assert_eq!(service.get_limits()["DB instances"].limit(), Some(100));
    }

    #[tokio::test]
    async fn find_usage_runs_every_finder() {
        let (mut service, connector) = service_with(fake_with_empty_responses(), None);

        assert!(!service.have_usage());
        service.find_usage().await.unwrap();

        assert!(service.have_usage());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

        let mut actions = connector.api.actions_called();
        actions.sort_unstable();
        assert_eq!(actions, REQUIRED_IAM_PERMISSIONS
            .iter()
            .map(|p| p.trim_start_matches("rds:"))
            .collect::<Vec<_>>());

        // Single-page responses: no marker parameter was ever passed.
        for (_, params) in connector.api.calls.lock().unwrap().iter() {
            assert!(params.is_empty());
        }
    }

    #[tokio::test]
    async fn find_usage_resets_previous_run() {
        let instances = envelope(
            "DescribeDBInstances",
            "DBInstances",
            json!([{
                "DBInstanceIdentifier": "foo",
                "AllocatedStorage": 100,
                "ReadReplicaDBInstanceIdentifiers": []
            }]),
        );
        let fake = fake_with_empty_responses().with("DescribeDBInstances", instances);
        let (mut service, _connector) = service_with(fake, None);

        service.find_usage().await.unwrap();
        service.find_usage().await.unwrap();

        let limits = service.get_limits();
        assert_eq!(limits["DB instances"].get_current_usage().len(), 1);
        assert_eq!(limits["DB instances"].get_current_usage()[0].value(), 1);
    }

    #[tokio::test]
    async fn find_usage_reports_failed_finders_and_keeps_the_rest() {
        // No canned snapshots response: that finder fails, the rest succeed.
        let mut fake = fake_with_empty_responses();
        fake.responses.remove("DescribeDBSnapshots");
        let (mut service, _connector) = service_with(fake, None);

        let err = service.find_usage().await.unwrap_err();
        match err {
            UsageError::Partial {
                service: name,
                total,
                failures,
            } => {
                assert_eq!(name, "RDS");
                assert_eq!(total, 8);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].resource, "snapshots");
            }
            other => panic!("expected partial failure, got {other}"),
        }

        assert!(!service.have_usage());
        // Finders that succeeded still attached their usage.
        let limits = service.get_limits();
        assert_eq!(limits["DB instances"].get_current_usage().len(), 1);
        assert!(limits["DB snapshots per user"].get_current_usage().is_empty());
    }

    #[test]
    fn config_overrides_apply_to_declared_limits() {
        use crate::config::{ConfigError, ThresholdOverride};

        let (mut service, _connector) = service_with(FakeRds::new(), None);
        let config = CheckerConfig {
            limit_overrides: HashMap::from([("DB instances".to_string(), 100)]),
            threshold_overrides: HashMap::from([(
                "DB snapshots per user".to_string(),
                ThresholdOverride {
                    warning: Some(Threshold::Count(10)),
                    critical: None,
                },
            )]),
            ..CheckerConfig::default()
        };

        config.apply_overrides(&mut service).unwrap();

        let limits = service.get_limits();
        assert_eq!(limits["DB instances"].limit(), Some(100));
        assert_eq!(
            limits["DB snapshots per user"].warning_threshold(),
            Threshold::Count(10)
        );
        // Critical keeps the service-level default.
        assert_eq!(
            limits["DB snapshots per user"].critical_threshold(),
            Threshold::Percent(43.0)
        );

        let bad = CheckerConfig {
            limit_overrides: HashMap::from([("No such limit".to_string(), 1)]),
            ..CheckerConfig::default()
        };
        assert!(matches!(
            bad.apply_overrides(&mut service),
            Err(ConfigError::UnknownLimit { .. })
        ));
    }

    #[test]
    fn required_iam_permissions_are_exact_and_sorted() {
        let (service, _connector) = service_with(FakeRds::new(), None);
        let permissions = service.required_iam_permissions();

        assert_eq!(
            permissions,
            &[
                "rds:DescribeDBInstances",
                "rds:DescribeDBParameterGroups",
                "rds:DescribeDBSecurityGroups",
                "rds:DescribeDBSnapshots",
                "rds:DescribeDBSubnetGroups",
                "rds:DescribeEventSubscriptions",
                "rds:DescribeOptionGroups",
                "rds:DescribeReservedDBInstances",
            ]
        );

        let mut sorted = permissions.to_vec();
        sorted.sort_unstable();
        assert_eq!(permissions, sorted);
    }

    #[tokio::test]
    async fn instances_feed_three_limits() {
        let api: Arc<dyn RdsApi> = Arc::new(FakeRds::new().with(
            "DescribeDBInstances",
            envelope(
                "DescribeDBInstances",
                "DBInstances",
                json!([
                    {
                        "DBInstanceIdentifier": "foo",
                        "AllocatedStorage": 200,
                        "ReadReplicaDBInstanceIdentifiers": []
                    },
                    {
                        "DBInstanceIdentifier": "baz",
                        "AllocatedStorage": 50,
                        "ReadReplicaDBInstanceIdentifiers": [
                            "baz-replica-1",
                            "baz-replica-2"
                        ]
                    }
                ]),
            ),
        ));
        let mut limits = test_limits();

        RdsService::find_usage_instances(&api, &mut limits, None)
            .await
            .unwrap();

        let usage = sorted_usage(&limits, "DB instances");
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].value(), 2);
        assert_eq!(usage[0].aws_type(), Some("AWS::RDS::DBInstance"));

        let usage = sorted_usage(&limits, "Storage quota (GB)");
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].value(), 250);
        assert_eq!(usage[0].aws_type(), Some("AWS::RDS::DBInstance"));

        let usage = sorted_usage(&limits, "Read replicas per master");
        assert_eq!(usage.len(), 2);
        assert_eq!(usage[0].value(), 0);
        assert_eq!(usage[0].resource_id(), Some("foo"));
        assert_eq!(usage[1].value(), 2);
        assert_eq!(usage[1].resource_id(), Some("baz"));
    }

    #[tokio::test]
    async fn only_manual_snapshots_count() {
        let api: Arc<dyn RdsApi> = Arc::new(FakeRds::new().with(
            "DescribeDBSnapshots",
            envelope(
                "DescribeDBSnapshots",
                "DBSnapshots",
                json!([
                    { "DBSnapshotIdentifier": "foo-snap", "SnapshotType": "manual" },
                    { "DBSnapshotIdentifier": "rds:foo-2015", "SnapshotType": "automated" },
                    { "DBSnapshotIdentifier": "rds:baz-2015", "SnapshotType": "automated" }
                ]),
            ),
        ));
        let mut limits = test_limits();

        RdsService::find_usage_snapshots(&api, &mut limits, None)
            .await
            .unwrap();

        let usage = sorted_usage(&limits, "DB snapshots per user");
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].value(), 1);
        assert_eq!(usage[0].aws_type(), Some("AWS::RDS::DBSnapshot"));
    }

    #[tokio::test]
    async fn parameter_groups_are_counted() {
        let api: Arc<dyn RdsApi> = Arc::new(FakeRds::new().with(
            "DescribeDBParameterGroups",
            envelope(
                "DescribeDBParameterGroups",
                "DBParameterGroups",
                json!([
                    { "DBParameterGroupName": "default.mysql5.6" },
                    { "DBParameterGroupName": "custom-params" }
                ]),
            ),
        ));
        let mut limits = test_limits();

        RdsService::find_usage_param_groups(&api, &mut limits, None)
            .await
            .unwrap();

        let usage = sorted_usage(&limits, "DB parameter groups");
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].value(), 2);
        assert_eq!(usage[0].aws_type(), Some("AWS::RDS::DBParameterGroup"));
    }

    #[tokio::test]
    async fn subnet_groups_count_groups_and_members() {
        let api: Arc<dyn RdsApi> = Arc::new(FakeRds::new().with(
            "DescribeDBSubnetGroups",
            envelope(
                "DescribeDBSubnetGroups",
                "DBSubnetGroups",
                json!([
                    {
                        "DBSubnetGroupName": "default",
                        "Subnets": [
                            { "SubnetIdentifier": "subnet-1", "SubnetStatus": "Active" },
                            { "SubnetIdentifier": "subnet-2", "SubnetStatus": "Active" },
                            { "SubnetIdentifier": "subnet-3", "SubnetStatus": "Active" }
                        ]
                    },
                    {
                        "DBSubnetGroupName": "SubnetGroup1",
                        "Subnets": [
                            { "SubnetIdentifier": "subnet-4", "SubnetStatus": "Active" },
                            { "SubnetIdentifier": "subnet-5", "SubnetStatus": "Active" }
                        ]
                    },
                    {
                        "DBSubnetGroupName": "SubnetGroup2",
                        "Subnets": [
                            { "SubnetIdentifier": "subnet-6", "SubnetStatus": "Active" }
                        ]
                    }
                ]),
            ),
        ));
        let mut limits = test_limits();

        RdsService::find_usage_subnet_groups(&api, &mut limits, None)
            .await
            .unwrap();

        let usage = sorted_usage(&limits, "Subnet Groups");
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].value(), 3);
        assert_eq!(usage[0].aws_type(), Some("AWS::RDS::DBSubnetGroup"));

        let usage = sorted_usage(&limits, "Subnets per Subnet Group");
        assert_eq!(usage.len(), 3);
        assert_eq!(usage[0].value(), 1);
        assert_eq!(usage[0].resource_id(), Some("SubnetGroup2"));
        assert_eq!(usage[1].value(), 2);
        assert_eq!(usage[1].resource_id(), Some("SubnetGroup1"));
        assert_eq!(usage[2].value(), 3);
        assert_eq!(usage[2].resource_id(), Some("default"));
    }

    #[tokio::test]
    async fn option_groups_are_counted() {
        let api: Arc<dyn RdsApi> = Arc::new(FakeRds::new().with(
            "DescribeOptionGroups",
            envelope(
                "DescribeOptionGroups",
                "OptionGroupsList",
                json!([
                    { "OptionGroupName": "default:mysql-5-6" },
                    { "OptionGroupName": "custom-options" }
                ]),
            ),
        ));
        let mut limits = test_limits();

        RdsService::find_usage_option_groups(&api, &mut limits, None)
            .await
            .unwrap();

        let usage = sorted_usage(&limits, "Option Groups");
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].value(), 2);
        assert_eq!(usage[0].aws_type(), Some("AWS::RDS::DBOptionGroup"));
    }

    #[tokio::test]
    async fn event_subscriptions_are_counted() {
        let api: Arc<dyn RdsApi> = Arc::new(FakeRds::new().with(
            "DescribeEventSubscriptions",
            envelope(
                "DescribeEventSubscriptions",
                "EventSubscriptionsList",
                json!([
                    { "CustSubscriptionId": "alerts" }
                ]),
            ),
        ));
        let mut limits = test_limits();

        RdsService::find_usage_event_subscriptions(&api, &mut limits, None)
            .await
            .unwrap();

        let usage = sorted_usage(&limits, "Event Subscriptions");
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].value(), 1);
        assert_eq!(usage[0].aws_type(), Some("AWS::RDS::EventSubscription"));
    }

    #[tokio::test]
    async fn security_groups_split_classic_and_vpc() {
        let api: Arc<dyn RdsApi> = Arc::new(FakeRds::new().with(
            "DescribeDBSecurityGroups",
            envelope(
                "DescribeDBSecurityGroups",
                "DBSecurityGroups",
                json!([
                    {
                        "DBSecurityGroupName": "SecurityGroup1",
                        "EC2SecurityGroups": [
                            { "EC2SecurityGroupName": "web", "Status": "authorized" }
                        ],
                        "IPRanges": []
                    },
                    {
                        "DBSecurityGroupName": "alctest",
                        "EC2SecurityGroups": [],
                        "IPRanges": [
                            { "CIDRIP": "10.0.0.0/8", "Status": "authorized" },
                            { "CIDRIP": "172.16.0.0/12", "Status": "authorized" }
                        ]
                    },
                    {
                        "DBSecurityGroupName": "default:vpc-a926c2cc",
                        "VpcId": "vpc-a926c2cc",
                        "EC2SecurityGroups": [],
                        "IPRanges": []
                    },
                    {
                        "DBSecurityGroupName": "SecurityGroup2",
                        "VpcId": "vpc-73ec9716",
                        "EC2SecurityGroups": [
                            { "EC2SecurityGroupName": "app", "Status": "authorized" }
                        ],
                        "IPRanges": [
                            { "CIDRIP": "192.168.0.0/16", "Status": "authorized" },
                            { "CIDRIP": "10.1.0.0/16", "Status": "authorized" }
                        ]
                    }
                ]),
            ),
        ));
        let mut limits = test_limits();

        RdsService::find_usage_security_groups(&api, &mut limits, None)
            .await
            .unwrap();

        let usage = sorted_usage(&limits, "DB security groups");
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].value(), 2);
        assert_eq!(usage[0].aws_type(), Some("AWS::RDS::DBSecurityGroup"));

        let usage = sorted_usage(&limits, "VPC Security Groups");
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].value(), 2);

        let usage = sorted_usage(&limits, "Max auths per security group");
        assert_eq!(usage.len(), 4);
        assert_eq!(usage[0].value(), 0);
        assert_eq!(usage[0].resource_id(), Some("default:vpc-a926c2cc"));
        assert_eq!(usage[1].value(), 1);
        assert_eq!(usage[1].resource_id(), Some("SecurityGroup1"));
        assert_eq!(usage[2].value(), 2);
        assert_eq!(usage[2].resource_id(), Some("alctest"));
        assert_eq!(usage[3].value(), 3);
        assert_eq!(usage[3].resource_id(), Some("SecurityGroup2"));
    }

    #[tokio::test]
    async fn reserved_instances_are_counted() {
        let api: Arc<dyn RdsApi> = Arc::new(FakeRds::new().with(
            "DescribeReservedDBInstances",
            envelope(
                "DescribeReservedDBInstances",
                "ReservedDBInstances",
                json!([
                    { "ReservedDBInstanceId": "ri-2015-01" },
                    { "ReservedDBInstanceId": "ri-2015-02" }
                ]),
            ),
        ));
        let mut limits = test_limits();

        RdsService::find_usage_reserved_instances(&api, &mut limits, None)
            .await
            .unwrap();

        let usage = sorted_usage(&limits, "Reserved Instances");
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].value(), 2);
        assert_eq!(usage[0].aws_type(), Some("AWS::RDS::DBInstance"));
    }

    #[tokio::test]
    async fn malformed_record_is_a_finder_error() {
        // AllocatedStorage as a string is a shape drift the finder must
        // surface, not swallow.
        let api: Arc<dyn RdsApi> = Arc::new(FakeRds::new().with(
            "DescribeDBInstances",
            envelope(
                "DescribeDBInstances",
                "DBInstances",
                json!([
                    { "DBInstanceIdentifier": "foo", "AllocatedStorage": "200" }
                ]),
            ),
        ));
        let mut limits = test_limits();

        let err = RdsService::find_usage_instances(&api, &mut limits, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }
}
