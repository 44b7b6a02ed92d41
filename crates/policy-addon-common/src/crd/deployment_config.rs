//! AddOnDeploymentConfig: hub-side placement and variable overrides for an add-on

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{ResourceRequirements, Toleration};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// AddOnDeploymentConfig supplies deployment overrides referenced by add-ons.
///
/// Example:
/// ```yaml
/// apiVersion: addon.open-cluster-management.io/v1alpha1
/// kind: AddOnDeploymentConfig
/// metadata:
///   name: policy-config
///   namespace: open-cluster-management
/// spec:
///   customizedVariables:
///     - name: managedKubeConfigSecret
///       value: external-managed-kubeconfig
///   nodePlacement:
///     nodeSelector:
///       kubernetes.io/os: linux
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "addon.open-cluster-management.io",
    version = "v1alpha1",
    kind = "AddOnDeploymentConfig",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AddOnDeploymentConfigSpec {
    /// Name/value pairs interpreted by each add-on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub customized_variables: Vec<CustomizedVariable>,

    /// Node selector and tolerations for the agent pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_placement: Option<NodePlacement>,

    /// Image registry mirrors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registries: Vec<ImageMirror>,

    /// Proxy settings for the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_config: Option<ProxyConfig>,

    /// Namespace to install the agent into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_install_namespace: Option<String>,

    /// Resource requirements per container (matched by regex)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_requirements: Vec<ContainerResourceRequirements>,
}

/// A customized variable
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct CustomizedVariable {
    /// Variable name
    pub name: String,
    /// Variable value
    #[serde(default)]
    pub value: String,
}

/// Pod placement overrides
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodePlacement {
    /// Node selector
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Tolerations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
}

/// Rewrites images whose name starts with `source` to start with `mirror`
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ImageMirror {
    /// Mirror registry prefix
    pub mirror: String,
    /// Source registry prefix; empty matches every image
    #[serde(default)]
    pub source: String,
}

/// Proxy settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// HTTP proxy URL
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub http_proxy: String,
    /// HTTPS proxy URL
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub https_proxy: String,
    /// Comma separated hosts that bypass the proxy
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub no_proxy: String,
}

/// Resource requirements applied to containers whose ID matches `containerID`
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ContainerResourceRequirements {
    /// `<resource type>:<resource name>:<container name>` regex (e.g., `deployments:*:*`)
    #[serde(rename = "containerID")]
    pub container_id: String,
    /// Requests and limits
    #[serde(default)]
    pub resources: ResourceRequirements,
}

impl AddOnDeploymentConfig {
    /// Customized variables as a name → value map; later duplicates win
    pub fn customized_variables(&self) -> BTreeMap<String, String> {
        self.spec
            .customized_variables
            .iter()
            .map(|v| (v.name.clone(), v.value.clone()))
            .collect()
    }
}
