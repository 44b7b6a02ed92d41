//! Builder for Helm-chart based agent add-ons

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::ResourceExt;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use tracing::{debug, instrument};

use policy_addon_common::crd::{ConfigGroupResource, ManagedCluster, ManagedClusterAddOn};
use policy_addon_common::kube_utils::manifest_from_value;
use policy_addon_common::{merge_values, Error, Result, Values, DEFAULT_INSTALL_NAMESPACE};

use crate::agent::{AgentAddon, AgentAddonOptions, InstallNamespaceFn};
use crate::registration::RegistrationOption;
use crate::values_fn::GetValuesFn;

/// Release identity passed to the chart alongside the values
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Release name (the add-on name)
    pub name: String,
    /// Namespace the agent is installed into
    pub namespace: String,
    /// Managed cluster the release targets
    pub cluster_name: String,
}

/// Renders a chart into manifests
#[cfg_attr(test, automock)]
pub trait ChartRenderer: Send + Sync {
    /// Render the chart for `release` with `values`
    fn render(&self, release: &ReleaseInfo, values: &Values) -> Result<Vec<Value>>;
}

/// Describes an agent add-on and builds it
pub struct AgentAddonFactory {
    options: AgentAddonOptions,
    get_values_fns: Vec<Arc<dyn GetValuesFn>>,
    renderer: Option<Arc<dyn ChartRenderer>>,
}

impl AgentAddonFactory {
    /// Start describing the add-on `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            options: AgentAddonOptions {
                addon_name: name.into(),
                config_gvrs: Vec::new(),
                registration: None,
                install_namespace: None,
                hosted_mode_enabled: false,
            },
            get_values_fns: Vec::new(),
            renderer: None,
        }
    }

    /// Configuration types the add-on accepts
    pub fn with_config_gvrs(mut self, gvrs: Vec<ConfigGroupResource>) -> Self {
        self.options.config_gvrs = gvrs;
        self
    }

    /// Values sources, lowest precedence first
    pub fn with_get_values_fns(mut self, fns: Vec<Arc<dyn GetValuesFn>>) -> Self {
        self.get_values_fns = fns;
        self
    }

    /// Hub registration
    pub fn with_agent_registration_option(mut self, registration: RegistrationOption) -> Self {
        self.options.registration = Some(Arc::new(registration));
        self
    }

    /// Install namespace resolver
    pub fn with_agent_install_namespace(mut self, f: Arc<dyn InstallNamespaceFn>) -> Self {
        self.options.install_namespace = Some(f);
        self
    }

    /// Allow the agent to run on a hosting cluster
    pub fn with_hosted_mode_enabled(mut self) -> Self {
        self.options.hosted_mode_enabled = true;
        self
    }

    /// Chart renderer
    pub fn with_chart_renderer(mut self, renderer: Arc<dyn ChartRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Build the add-on; a chart renderer is required
    pub fn build_helm_agent_addon(self) -> Result<HelmAgentAddon> {
        let renderer = self.renderer.ok_or_else(|| {
            Error::internal_with_context(
                "factory",
                format!("no chart renderer configured for {}", self.options.addon_name),
            )
        })?;

        Ok(HelmAgentAddon {
            options: self.options,
            get_values_fns: self.get_values_fns,
            renderer,
        })
    }
}

/// Agent add-on rendered from a Helm chart
pub struct HelmAgentAddon {
    options: AgentAddonOptions,
    get_values_fns: Vec<Arc<dyn GetValuesFn>>,
    renderer: Arc<dyn ChartRenderer>,
}

impl HelmAgentAddon {
    /// Resolve the install namespace, falling back to the default
    pub async fn install_namespace(&self, addon: &ManagedClusterAddOn) -> Result<String> {
        let namespace = match &self.options.install_namespace {
            Some(f) => f.install_namespace(addon).await?,
            None => String::new(),
        };
        if namespace.is_empty() {
            return Ok(DEFAULT_INSTALL_NAMESPACE.to_string());
        }
        Ok(namespace)
    }
}

#[async_trait]
impl AgentAddon for HelmAgentAddon {
    fn options(&self) -> &AgentAddonOptions {
        &self.options
    }

    #[instrument(skip_all, fields(addon = %self.options.addon_name, cluster = %cluster.name_any()))]
    async fn values(
        &self,
        cluster: &ManagedCluster,
        addon: &ManagedClusterAddOn,
    ) -> Result<Values> {
        let mut values = Values::new();
        for get_values_fn in &self.get_values_fns {
            merge_values(&mut values, get_values_fn.values(cluster, addon).await?);
        }
        Ok(values)
    }

    async fn manifests(
        &self,
        cluster: &ManagedCluster,
        addon: &ManagedClusterAddOn,
    ) -> Result<Vec<DynamicObject>> {
        let values = self.values(cluster, addon).await?;
        let release = ReleaseInfo {
            name: self.options.addon_name.clone(),
            namespace: self.install_namespace(addon).await?,
            cluster_name: cluster.name_any(),
        };

        let rendered = self.renderer.render(&release, &values)?;
        debug!(
            addon = %release.name,
            cluster = %release.cluster_name,
            namespace = %release.namespace,
            count = rendered.len(),
            "rendered agent manifests"
        );

        rendered
            .into_iter()
            .map(|value| manifest_from_value(value).map(|m| m.object))
            .collect()
    }
}
