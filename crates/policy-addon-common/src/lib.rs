//! Common types for the governance policy add-ons: CRDs, values, and parsing helpers

#![deny(missing_docs)]

pub mod cluster;
pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod parse;
pub mod telemetry;
pub mod values;
pub mod yaml;

pub use error::Error;
pub use values::{merge_values, to_values, Values};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group of the add-on resources (ManagedClusterAddOn, AddOnDeploymentConfig)
pub const ADDON_API_GROUP: &str = "addon.open-cluster-management.io";

/// Annotation on a ManagedClusterAddOn naming the cluster that hosts the agent (hosted mode)
pub const HOSTING_CLUSTER_NAME_ANNOTATION: &str =
    "addon.open-cluster-management.io/hosting-cluster-name";

/// Annotation on a ManagedClusterAddOn carrying raw Helm values as a JSON object
pub const ADDON_VALUES_ANNOTATION: &str = "addon.open-cluster-management.io/values";

/// Namespace agents are installed into when nothing overrides it
pub const DEFAULT_INSTALL_NAMESPACE: &str = "open-cluster-management-agent-addon";

/// Name of the hub cluster when it manages itself
pub const LOCAL_CLUSTER_NAME: &str = "local-cluster";
