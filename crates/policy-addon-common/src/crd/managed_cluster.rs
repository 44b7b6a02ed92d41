//! ManagedCluster: a remote cluster onboarded to the hub

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Cluster claim carrying the product/distribution name (e.g., "OpenShift")
pub const PRODUCT_CLAIM: &str = "product.open-cluster-management.io";

/// Cluster claim carrying the Kubernetes version of the managed cluster
pub const KUBE_VERSION_CLAIM: &str = "kubeversion.open-cluster-management.io";

/// ManagedCluster represents a cluster joined to the hub.
///
/// Example:
/// ```yaml
/// apiVersion: cluster.open-cluster-management.io/v1
/// kind: ManagedCluster
/// metadata:
///   name: cluster1
///   labels:
///     vendor: OpenShift
///     openshiftVersion-major: "4"
/// spec:
///   hubAcceptsClient: true
/// status:
///   clusterClaims:
///     - name: kubeversion.open-cluster-management.io
///       value: v1.29.3
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "cluster.open-cluster-management.io",
    version = "v1",
    kind = "ManagedCluster",
    status = "ManagedClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterSpec {
    /// Whether the hub accepts the cluster's registration agent
    #[serde(default)]
    pub hub_accepts_client: bool,

    /// Lease duration of the registration agent, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_duration_seconds: Option<i32>,
}

/// Observed state of a ManagedCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterStatus {
    /// Claims reported by the cluster's klusterlet
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_claims: Vec<ClusterClaim>,

    /// Versions reported by the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ManagedClusterVersion>,
}

/// A single name/value claim reported by a managed cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ClusterClaim {
    /// Claim name
    pub name: String,
    /// Claim value
    #[serde(default)]
    pub value: String,
}

/// Version information of a managed cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ManagedClusterVersion {
    /// Kubernetes version (e.g., "v1.29.3")
    #[serde(default)]
    pub kubernetes: String,
}

impl ManagedCluster {
    /// Value of the named cluster claim, if reported
    pub fn claim(&self, name: &str) -> Option<&str> {
        self.status
            .as_ref()?
            .cluster_claims
            .iter()
            .find(|claim| claim.name == name)
            .map(|claim| claim.value.as_str())
    }
}
