//! The agent add-on contract consumed by the add-on manager

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::DynamicObject;
#[cfg(test)]
use mockall::automock;

use policy_addon_common::crd::{ConfigGroupResource, ManagedCluster, ManagedClusterAddOn};
use policy_addon_common::{Result, Values};

use crate::registration::RegistrationOption;

/// Resolve the namespace an agent is installed into
///
/// An empty string means "no preference"; the framework default applies.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InstallNamespaceFn: Send + Sync {
    /// Namespace for the agent of `addon`
    async fn install_namespace(&self, addon: &ManagedClusterAddOn) -> Result<String>;
}

/// Static description of an agent add-on
#[derive(Clone)]
pub struct AgentAddonOptions {
    /// Add-on name (also the ManagedClusterAddOn name)
    pub addon_name: String,
    /// Configuration types the add-on accepts
    pub config_gvrs: Vec<ConfigGroupResource>,
    /// Hub registration; `None` when the agent needs no hub credentials
    pub registration: Option<Arc<RegistrationOption>>,
    /// Install namespace resolver
    pub install_namespace: Option<Arc<dyn InstallNamespaceFn>>,
    /// Whether the agent may be deployed on a hosting cluster
    pub hosted_mode_enabled: bool,
}

impl std::fmt::Debug for AgentAddonOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentAddonOptions")
            .field("addon_name", &self.addon_name)
            .field("config_gvrs", &self.config_gvrs)
            .field("registration", &self.registration.is_some())
            .field("install_namespace", &self.install_namespace.is_some())
            .field("hosted_mode_enabled", &self.hosted_mode_enabled)
            .finish()
    }
}

/// An add-on agent deployable to managed clusters
#[async_trait]
pub trait AgentAddon: Send + Sync {
    /// Static options
    fn options(&self) -> &AgentAddonOptions;

    /// Add-on name
    fn name(&self) -> &str {
        &self.options().addon_name
    }

    /// Merged Helm values for the agent on `cluster`
    async fn values(&self, cluster: &ManagedCluster, addon: &ManagedClusterAddOn)
        -> Result<Values>;

    /// Manifests to deploy for the agent on `cluster`
    async fn manifests(
        &self,
        cluster: &ManagedCluster,
        addon: &ManagedClusterAddOn,
    ) -> Result<Vec<DynamicObject>>;
}
