//! RDS API response models.
//!
//! Field names match the provider's documented response shape verbatim; the
//! rename attributes are the wire contract.

use serde::Deserialize;

/// One DB instance record from `DescribeDBInstances`.
#[derive(Debug, Clone, Deserialize)]
pub struct DbInstance {
    /// Instance identifier.
    #[serde(rename = "DBInstanceIdentifier")]
    pub db_instance_identifier: String,
    /// Allocated storage in GB.
    #[serde(rename = "AllocatedStorage", default)]
    pub allocated_storage: u64,
    /// Identifiers of read replicas of this instance.
    #[serde(rename = "ReadReplicaDBInstanceIdentifiers", default)]
    pub read_replica_db_instance_identifiers: Vec<String>,
}

/// One DB snapshot record from `DescribeDBSnapshots`.
#[derive(Debug, Clone, Deserialize)]
pub struct DbSnapshot {
    /// Snapshot identifier.
    #[serde(rename = "DBSnapshotIdentifier")]
    pub db_snapshot_identifier: String,
    /// "manual" or "automated".
    #[serde(rename = "SnapshotType")]
    pub snapshot_type: String,
}

/// One DB parameter group record from `DescribeDBParameterGroups`.
#[derive(Debug, Clone, Deserialize)]
pub struct DbParameterGroup {
    /// Parameter group name.
    #[serde(rename = "DBParameterGroupName")]
    pub db_parameter_group_name: String,
}

/// One DB security group record from `DescribeDBSecurityGroups`.
#[derive(Debug, Clone, Deserialize)]
pub struct DbSecurityGroup {
    /// Security group name.
    #[serde(rename = "DBSecurityGroupName")]
    pub db_security_group_name: String,
    /// VPC the group belongs to; absent for classic (non-VPC) groups.
    #[serde(rename = "VpcId", default)]
    pub vpc_id: Option<String>,
    /// Authorized EC2 security groups.
    #[serde(rename = "EC2SecurityGroups", default)]
    pub ec2_security_groups: Vec<Ec2SecurityGroup>,
    /// Authorized IP ranges.
    #[serde(rename = "IPRanges", default)]
    pub ip_ranges: Vec<IpRange>,
}

/// An EC2 security group authorization inside a DB security group.
#[derive(Debug, Clone, Deserialize)]
pub struct Ec2SecurityGroup {
    /// Name of the authorized EC2 security group.
    #[serde(rename = "EC2SecurityGroupName", default)]
    pub ec2_security_group_name: Option<String>,
    /// Authorization status.
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
}

/// An IP range authorization inside a DB security group.
#[derive(Debug, Clone, Deserialize)]
pub struct IpRange {
    /// The authorized CIDR.
    #[serde(rename = "CIDRIP", default)]
    pub cidrip: Option<String>,
    /// Authorization status.
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
}

/// One DB subnet group record from `DescribeDBSubnetGroups`.
#[derive(Debug, Clone, Deserialize)]
pub struct DbSubnetGroup {
    /// Subnet group name.
    #[serde(rename = "DBSubnetGroupName")]
    pub db_subnet_group_name: String,
    /// Member subnets.
    #[serde(rename = "Subnets", default)]
    pub subnets: Vec<Subnet>,
}

/// A subnet inside a DB subnet group.
#[derive(Debug, Clone, Deserialize)]
pub struct Subnet {
    /// Subnet identifier.
    #[serde(rename = "SubnetIdentifier", default)]
    pub subnet_identifier: Option<String>,
    /// Subnet status.
    #[serde(rename = "SubnetStatus", default)]
    pub subnet_status: Option<String>,
}

/// One option group record from `DescribeOptionGroups`.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionGroup {
    /// Option group name.
    #[serde(rename = "OptionGroupName")]
    pub option_group_name: String,
}

/// One event subscription record from `DescribeEventSubscriptions`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventSubscription {
    /// Subscription identifier.
    #[serde(rename = "CustSubscriptionId", default)]
    pub cust_subscription_id: Option<String>,
}

/// One reserved instance record from `DescribeReservedDBInstances`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReservedDbInstance {
    /// Reservation identifier.
    #[serde(rename = "ReservedDBInstanceId")]
    pub reserved_db_instance_id: String,
}
