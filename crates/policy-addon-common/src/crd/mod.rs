//! Custom Resource Definitions read by the policy add-ons
//!
//! These mirror the open-cluster-management hub APIs. Only the fields the
//! add-ons consume are modelled; unknown fields are ignored on decode.

mod addon;
mod deployment_config;
mod managed_cluster;

pub use addon::{
    AddOnConfig, ConfigReference, ConfigSpecHash, ManagedClusterAddOn, ManagedClusterAddOnSpec,
    ManagedClusterAddOnStatus,
};
pub use deployment_config::{
    AddOnDeploymentConfig, AddOnDeploymentConfigSpec, ContainerResourceRequirements,
    CustomizedVariable, ImageMirror, NodePlacement, ProxyConfig,
};
pub use managed_cluster::{
    ClusterClaim, ManagedCluster, ManagedClusterSpec, ManagedClusterStatus,
    ManagedClusterVersion, KUBE_VERSION_CLAIM, PRODUCT_CLAIM,
};

/// Group/resource pair identifying a configuration type an add-on accepts
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConfigGroupResource {
    /// API group (e.g., "addon.open-cluster-management.io")
    pub group: String,
    /// Plural resource name (e.g., "addondeploymentconfigs")
    pub resource: String,
}

impl ConfigGroupResource {
    /// The AddOnDeploymentConfig group/resource
    pub fn addon_deployment_config() -> Self {
        Self {
            group: crate::ADDON_API_GROUP.to_string(),
            resource: "addondeploymentconfigs".to_string(),
        }
    }
}
