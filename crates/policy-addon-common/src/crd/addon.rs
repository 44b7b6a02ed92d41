//! ManagedClusterAddOn: one add-on enabled on one managed cluster

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConfigGroupResource;
use crate::HOSTING_CLUSTER_NAME_ANNOTATION;

/// ManagedClusterAddOn lives in the managed cluster's namespace on the hub.
///
/// Example:
/// ```yaml
/// apiVersion: addon.open-cluster-management.io/v1alpha1
/// kind: ManagedClusterAddOn
/// metadata:
///   name: config-policy-controller
///   namespace: cluster1
///   annotations:
///     log-level: "2"
/// spec:
///   installNamespace: open-cluster-management-agent-addon
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "addon.open-cluster-management.io",
    version = "v1alpha1",
    kind = "ManagedClusterAddOn",
    namespaced,
    status = "ManagedClusterAddOnStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterAddOnSpec {
    /// Namespace on the managed (or hosting) cluster to deploy the agent into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_namespace: Option<String>,

    /// Per-cluster configuration overrides
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configs: Vec<AddOnConfig>,
}

/// Reference to a configuration resource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddOnConfig {
    /// API group of the configuration
    #[serde(default)]
    pub group: String,
    /// Plural resource name of the configuration
    pub resource: String,
    /// Name of the configuration
    pub name: String,
    /// Namespace of the configuration (empty for cluster scoped)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Observed state of a ManagedClusterAddOn
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterAddOnStatus {
    /// Configurations resolved for this add-on by the hub
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_references: Vec<ConfigReference>,
}

/// A resolved configuration reference
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigReference {
    /// API group of the configuration
    #[serde(default)]
    pub group: String,
    /// Plural resource name of the configuration
    pub resource: String,
    /// Name of the last applied configuration
    #[serde(default)]
    pub name: String,
    /// Namespace of the last applied configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// The configuration the hub wants applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_config: Option<ConfigSpecHash>,
}

/// Configuration identity plus the hash of its spec
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSpecHash {
    /// Name of the configuration
    pub name: String,
    /// Namespace of the configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Hash of the configuration spec
    #[serde(default)]
    pub spec_hash: String,
}

impl ManagedClusterAddOn {
    /// Value of an annotation, if present
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()?
            .get(key)
            .map(String::as_str)
    }

    /// Name of the hosting cluster when the add-on runs in hosted mode
    ///
    /// An empty annotation value is treated as absent.
    pub fn hosting_cluster_name(&self) -> Option<&str> {
        self.annotation(HOSTING_CLUSTER_NAME_ANNOTATION)
            .filter(|name| !name.is_empty())
    }

    /// `spec.installNamespace`, if set and non-empty
    pub fn install_namespace(&self) -> Option<&str> {
        self.spec
            .install_namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
    }

    /// Status reference for the given configuration type
    pub fn config_reference(&self, gr: &ConfigGroupResource) -> Option<&ConfigReference> {
        self.status
            .as_ref()?
            .config_references
            .iter()
            .find(|r| r.group == gr.group && r.resource == gr.resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::ResourceExt;

    const ADDON_YAML: &str = r#"
apiVersion: addon.open-cluster-management.io/v1alpha1
kind: ManagedClusterAddOn
metadata:
  name: cert-policy-controller
  namespace: cluster2
  annotations:
    addon.open-cluster-management.io/hosting-cluster-name: local-cluster
spec:
  installNamespace: cluster2-hosted
status:
  configReferences:
    - group: addon.open-cluster-management.io
      resource: addondeploymentconfigs
      name: old-config
      namespace: open-cluster-management
      desiredConfig:
        name: policy-config
        namespace: open-cluster-management
        specHash: abc123
"#;

    fn sample_addon() -> ManagedClusterAddOn {
        let value = crate::yaml::parse_yaml(ADDON_YAML).expect("parse yaml");
        serde_json::from_value(value).expect("parse")
    }

    #[test]
    fn addon_yaml() {
        let addon = sample_addon();
        assert_eq!(addon.name_any(), "cert-policy-controller");
        assert_eq!(addon.namespace().as_deref(), Some("cluster2"));
        assert_eq!(addon.hosting_cluster_name(), Some("local-cluster"));
        assert_eq!(addon.install_namespace(), Some("cluster2-hosted"));
    }

    #[test]
    fn config_reference_lookup() {
        let addon = sample_addon();
        let reference = addon
            .config_reference(&ConfigGroupResource::addon_deployment_config())
            .expect("reference");
        let desired = reference.desired_config.as_ref().expect("desired");
        assert_eq!(desired.name, "policy-config");
        assert_eq!(desired.spec_hash, "abc123");

        let other = ConfigGroupResource {
            group: "example.io".to_string(),
            resource: "widgets".to_string(),
        };
        assert!(addon.config_reference(&other).is_none());
    }

    #[test]
    fn empty_hosting_annotation_is_absent() {
        let mut addon = sample_addon();
        addon
            .annotations_mut()
            .insert(HOSTING_CLUSTER_NAME_ANNOTATION.to_string(), String::new());
        addon.spec.install_namespace = Some(String::new());
        assert_eq!(addon.hosting_cluster_name(), None);
        assert_eq!(addon.install_namespace(), None);
    }
}
