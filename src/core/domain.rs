use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// --- Inputs (as served by the backend) ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Direct,
    Azure,
    Runpod,
    Gcp,
}

impl Provider {
    /// Hosted-cloud pools are launched on demand; direct pools are static SSH hosts.
    pub fn is_hosted_cloud(&self) -> bool {
        !matches!(self, Provider::Direct)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Direct => "direct",
            Provider::Azure => "azure",
            Provider::Runpod => "runpod",
            Provider::Gcp => "gcp",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Host {
    pub address: String,
    /// Display name, used to match hosted-cloud live clusters.
    #[serde(default)]
    pub name: Option<String>,
    /// SSH login user (not the reservation owner).
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub identity_file: Option<String>,
    #[serde(default)]
    pub resources: Option<String>,
}

impl Host {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NodePoolConfig {
    pub provider: Provider,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hosts: Vec<Host>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub max_instances: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_configured: bool,
}

/// Treats an explicit `null` the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl NodePoolConfig {
    pub fn pool_id(&self) -> String {
        format!("{}/{}", self.provider, self.name)
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum ClusterStatus {
    Up,
    Init,
    Stopped,
    Other(String),
}

impl From<String> for ClusterStatus {
    fn from(s: String) -> Self {
        match s.trim().to_uppercase().as_str() {
            "UP" => ClusterStatus::Up,
            "INIT" => ClusterStatus::Init,
            "STOPPED" => ClusterStatus::Stopped,
            _ => ClusterStatus::Other(s),
        }
    }
}

impl From<ClusterStatus> for String {
    fn from(s: ClusterStatus) -> Self {
        match s {
            ClusterStatus::Up => "UP".into(),
            ClusterStatus::Init => "INIT".into(),
            ClusterStatus::Stopped => "STOPPED".into(),
            ClusterStatus::Other(raw) => raw,
        }
    }
}

impl ClusterStatus {
    /// UP and INIT both hold the reservation.
    pub fn is_live(&self) -> bool {
        matches!(self, ClusterStatus::Up | ClusterStatus::Init)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveClusterRecord {
    #[serde(alias = "cluster")]
    pub name: String,
    pub status: ClusterStatus,
    /// Pool the cluster was launched against, when the backend reports it.
    #[serde(default)]
    pub pool: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub job_name: Option<String>,
}

/// A telemetry value that may arrive as a number, a string, or anything else.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    /// Any other JSON shape; reads as no value.
    Other(serde_json::Value),
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct GpuTelemetrySample {
    #[serde(default)]
    pub utilization: Option<RawValue>,
    #[serde(default)]
    pub free: Option<RawValue>,
    #[serde(default)]
    pub total: Option<RawValue>,
}

/// Samples for one node, one per accelerator. Decoding never fails:
/// a non-array value yields no samples and non-object entries are skipped.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct NodeSamples(pub Vec<GpuTelemetrySample>);

impl<'de> Deserialize<'de> for NodeSamples {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let samples = match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter(|item| item.is_object())
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        };
        Ok(NodeSamples(samples))
    }
}

impl From<Vec<GpuTelemetrySample>> for NodeSamples {
    fn from(samples: Vec<GpuTelemetrySample>) -> Self {
        NodeSamples(samples)
    }
}

impl std::ops::Deref for NodeSamples {
    type Target = [GpuTelemetrySample];

    fn deref(&self) -> &[GpuTelemetrySample] {
        &self.0
    }
}

/// node address -> samples
pub type TelemetryMap = HashMap<String, NodeSamples>;

// --- Derived view model ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GpuCapacity {
    pub total: u32,
    pub free: u32,
}

impl GpuCapacity {
    pub fn used(&self) -> u32 {
        self.total.saturating_sub(self.free)
    }
}

impl std::ops::Add for GpuCapacity {
    type Output = GpuCapacity;

    fn add(self, rhs: GpuCapacity) -> GpuCapacity {
        GpuCapacity {
            total: self.total.saturating_add(rhs.total),
            free: self.free.saturating_add(rhs.free),
        }
    }
}

impl std::iter::Sum for GpuCapacity {
    fn sum<I: Iterator<Item = GpuCapacity>>(iter: I) -> Self {
        iter.fold(GpuCapacity::default(), |acc, c| acc + c)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Dedicated,
    OnDemand,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    Inactive,
    /// Reserved for an external health signal; never produced by the resolver.
    Unhealthy,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedNode {
    pub id: String,
    pub pool_id: String,
    pub address: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub status: NodeStatus,
    pub owner: Option<String>,
    pub job_name: Option<String>,
    pub gpu: GpuCapacity,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PoolState {
    Ready,
    NotConfigured,
    Empty,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoolView {
    pub pool_id: String,
    pub display_name: String,
    pub provider: Provider,
    pub state: PoolState,
    pub max_instances: u32,
    pub nodes: Vec<ResolvedNode>,
    pub gpu: GpuCapacity,
    pub capacity_percent: u8,
    pub assigned_to_current_user_count: usize,
}

#[derive(Deserialize)]
pub struct ViewParams {
    pub user: Option<String>,
}
