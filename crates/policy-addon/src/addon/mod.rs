//! Shared values and wiring for the policy add-ons
//!
//! Every add-on builds its values from the same pieces: a skeleton of
//! [`CommonValues`], cluster facts from [`CommonValues::set_common_values`],
//! user overrides from add-on annotations and deployment-config customized
//! variables, and finally [`mandate_values`]. User input never fails a values
//! computation; rejected input is logged and the previous value is kept.

pub mod certpolicy;
pub mod configpolicy;
pub mod iampolicy;
pub mod policyframework;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::ResourceExt;
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use policy_addon_common::cluster::{cluster_vendor, is_old_kubernetes, OPENSHIFT_VENDOR};
use policy_addon_common::crd::{AddOnDeploymentConfig, ManagedCluster, ManagedClusterAddOn};
use policy_addon_common::parse::{
    bool_or_default, log_fallback, log_level, parse_bool, parse_log_level, parse_uint8,
    uint8_or_default,
};
use policy_addon_common::values::set_path;
use policy_addon_common::{Error, Values};
use policy_addon_framework::deployment_config::{
    deployment_config_values, desired_deployment_config, to_image_override_values,
};
use policy_addon_framework::{
    AddonManager, AgentAddon, AgentAddonOptions, DeploymentConfigGetter, GetValuesFn,
    InstallNamespaceFn,
};

use crate::listers::ManagedClusterLister;

/// Set to `"true"` to stop manifest updates for an add-on
pub const POLICY_ADDON_PAUSE_ANNOTATION: &str = "policy-addon-pause";
/// Agent log level
pub const POLICY_LOG_LEVEL_ANNOTATION: &str = "log-level";
/// Toggle the agent metrics endpoint
pub const PROMETHEUS_ENABLED_ANNOTATION: &str = "prometheus-metrics-enabled";
/// Policies evaluated in parallel
pub const EVALUATION_CONCURRENCY_ANNOTATION: &str = "policy-evaluation-concurrency";
/// Agent client queries per second
pub const CLIENT_QPS_ANNOTATION: &str = "client-qps";
/// Agent client burst
pub const CLIENT_BURST_ANNOTATION: &str = "client-burst";

/// Pull secret every agent deployment references
pub const IMAGE_PULL_SECRET: &str = "open-cluster-management-image-pull-credentials";
/// Namespace of the OpenShift monitoring ServiceMonitors
pub const SERVICE_MONITOR_NAMESPACE: &str = "openshift-monitoring";

/// `global` values shared by every chart
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalValues {
    /// Image pull policy
    pub image_pull_policy: String,
    /// Image pull secret name
    pub image_pull_secret: String,
    /// Image key to image
    pub image_overrides: BTreeMap<String, String>,
    /// Agent node selector
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    /// `HTTP_PROXY`, `HTTPS_PROXY`, `NO_PROXY`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub proxy_config: BTreeMap<String, String>,
}

impl GlobalValues {
    /// Defaults with a single image override
    pub fn new(image_key: &str, image: &str) -> Self {
        Self {
            image_pull_policy: "IfNotPresent".to_string(),
            image_pull_secret: IMAGE_PULL_SECRET.to_string(),
            image_overrides: BTreeMap::from([(image_key.to_string(), image.to_string())]),
            node_selector: BTreeMap::new(),
            proxy_config: BTreeMap::new(),
        }
    }
}

/// Agent command-line arguments (`args`)
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserArgs {
    /// `console` or `json`
    pub log_encoder: String,
    /// Agent log level
    pub log_level: i8,
    /// Log level of the libraries the agent uses
    pub pkg_log_level: i8,
    /// Policies evaluated in parallel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_concurrency: Option<u8>,
    /// Client queries per second
    #[serde(rename = "clientQPS", skip_serializing_if = "Option::is_none")]
    pub client_qps: Option<u8>,
    /// Client burst
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_burst: Option<u8>,
}

impl Default for UserArgs {
    fn default() -> Self {
        Self {
            log_encoder: "console".to_string(),
            log_level: 0,
            pkg_log_level: -1,
            evaluation_concurrency: None,
            client_qps: None,
            client_burst: None,
        }
    }
}

impl UserArgs {
    /// Set the agent log level; libraries log two levels quieter
    pub fn set_log_level(&mut self, level: i8) {
        self.log_level = level;
        self.pkg_log_level = level.saturating_sub(2);
    }
}

/// Where the agent runs relative to its managed cluster
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum InstallMode {
    /// On the managed cluster itself
    #[default]
    Default,
    /// On a hosting cluster, reaching the managed cluster remotely
    Hosted,
}

/// Metrics settings
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusValues {
    /// Serve metrics
    pub enabled: bool,
    /// ServiceMonitor settings, on OpenShift
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_monitor: Option<ServiceMonitorValues>,
}

/// Where the ServiceMonitor is created
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceMonitorValues {
    /// ServiceMonitor namespace
    pub namespace: String,
}

/// Values every policy add-on chart understands
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonValues {
    /// `global`
    pub global: GlobalValues,
    /// `args`
    pub args: UserArgs,
    /// Managed cluster name
    pub cluster_name: String,
    /// Secret with the agent's hub kubeconfig
    pub hub_kube_config_secret: String,
    /// Default or Hosted
    pub install_mode: InstallMode,
    /// Vendor of the managed cluster
    pub kubernetes_distribution: String,
    /// Vendor of the hosting cluster, in hosted mode
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hosting_kubernetes_distribution: String,
    /// `prometheus`
    pub prometheus: PrometheusValues,
}

impl CommonValues {
    /// Skeleton values before any cluster or user input
    pub fn new(image_key: &str, image: &str) -> Self {
        Self {
            global: GlobalValues::new(image_key, image),
            args: UserArgs::default(),
            cluster_name: String::new(),
            hub_kube_config_secret: String::new(),
            install_mode: InstallMode::Default,
            kubernetes_distribution: String::new(),
            hosting_kubernetes_distribution: String::new(),
            prometheus: PrometheusValues::default(),
        }
    }

    /// Fill in the cluster facts
    ///
    /// In hosted mode the hosting cluster must be known to `clusters`, and
    /// its vendor decides whether metrics are enabled.
    pub fn set_common_values(
        &mut self,
        cluster: &ManagedCluster,
        addon: &ManagedClusterAddOn,
        clusters: &dyn ManagedClusterLister,
    ) -> policy_addon_common::Result<()> {
        self.cluster_name = cluster.name_any();
        self.hub_kube_config_secret = format!("{}-hub-kubeconfig", addon.name_any());
        self.kubernetes_distribution = cluster_vendor(cluster);

        let mut vendor = self.kubernetes_distribution.clone();
        if let Some(hosting_cluster_name) = addon.hosting_cluster_name() {
            let hosting_cluster = clusters
                .get_cluster(hosting_cluster_name)
                .ok_or_else(|| Error::not_found("ManagedCluster", hosting_cluster_name))?;
            self.install_mode = InstallMode::Hosted;
            self.hosting_kubernetes_distribution = cluster_vendor(&hosting_cluster);
            vendor = self.hosting_kubernetes_distribution.clone();
        }

        if vendor == OPENSHIFT_VENDOR {
            self.prometheus.enabled = true;
            self.prometheus.service_monitor = Some(ServiceMonitorValues {
                namespace: SERVICE_MONITOR_NAMESPACE.to_string(),
            });
        }
        Ok(())
    }

    /// Apply the common add-on annotations
    pub fn set_common_values_from_annotations(
        &mut self,
        addon: &ManagedClusterAddOn,
        component: &str,
    ) {
        if let Some(raw) = addon.annotation(POLICY_LOG_LEVEL_ANNOTATION) {
            self.args
                .set_log_level(log_level(POLICY_LOG_LEVEL_ANNOTATION, component, raw));
        }

        if let Some(raw) = addon.annotation(PROMETHEUS_ENABLED_ANNOTATION) {
            self.prometheus.enabled = bool_or_default(
                PROMETHEUS_ENABLED_ANNOTATION,
                component,
                raw,
                self.prometheus.enabled,
            );
        }

        for (key, target) in [
            (
                EVALUATION_CONCURRENCY_ANNOTATION,
                &mut self.args.evaluation_concurrency,
            ),
            (CLIENT_QPS_ANNOTATION, &mut self.args.client_qps),
            (CLIENT_BURST_ANNOTATION, &mut self.args.client_burst),
        ] {
            if let Some(raw) = addon.annotation(key) {
                set_uint8(target, key, component, raw);
            }
        }
    }
}

fn set_uint8(target: &mut Option<u8>, key: &str, component: &str, raw: &str) {
    *target = match *target {
        Some(current) => Some(uint8_or_default(key, component, raw, current)),
        None => parse_uint8(raw).or_else(|| {
            log_fallback(key, raw, component, "unset");
            None
        }),
    };
}

/// Values from the common customized variables of a deployment config
///
/// Only variables that are set and valid appear in the returned values.
/// Variables that are not common are returned for the add-on to handle.
pub fn common_values_from_customized_variables(
    config: &AddOnDeploymentConfig,
    component: &str,
) -> (Values, BTreeMap<String, String>) {
    let mut values = Values::new();
    let mut remaining = BTreeMap::new();

    for (name, raw) in config.customized_variables() {
        match name.as_str() {
            "logLevel" => match parse_log_level(&raw) {
                Some(level) => {
                    let mut args = UserArgs::default();
                    args.set_log_level(level);
                    set_path(&mut values, "args.logLevel", json!(args.log_level));
                    set_path(&mut values, "args.pkgLogLevel", json!(args.pkg_log_level));
                }
                None => log_ignored_variable(component, &name, &raw),
            },
            "logEncoder" => set_path(&mut values, "args.logEncoder", json!(raw)),
            "prometheusEnabled" => match parse_bool(&raw) {
                Ok(enabled) => set_path(&mut values, "prometheus.enabled", json!(enabled)),
                Err(_) => log_ignored_variable(component, &name, &raw),
            },
            "evaluationConcurrency" | "clientQPS" | "clientBurst" => match parse_uint8(&raw) {
                Some(value) => set_path(&mut values, &format!("args.{}", name), json!(value)),
                None => log_ignored_variable(component, &name, &raw),
            },
            _ => {
                remaining.insert(name, raw);
            }
        }
    }

    (values, remaining)
}

/// Log a customized variable whose value was rejected
pub fn log_ignored_variable(component: &str, variable: &str, value: &str) {
    error!(
        component = %component,
        variable = %variable,
        value = %value,
        "invalid customized variable value, ignoring"
    );
}

/// Log a customized variable the add-on does not support
pub fn log_unsupported_variable(component: &str, variable: &str, value: &str) {
    warn!(
        component = %component,
        variable = %variable,
        value = %value,
        "variable is not supported"
    );
}

/// Values forced regardless of user input
///
/// Clusters on Kubernetes older than 1.14 cannot run leader election, so
/// they get a single replica.
pub fn mandate_values(
    cluster: &ManagedCluster,
    _addon: &ManagedClusterAddOn,
) -> policy_addon_common::Result<Values> {
    let mut values = Values::new();
    if is_old_kubernetes(cluster) {
        values.insert("replicas".to_string(), json!(1));
    }
    Ok(values)
}

/// Values function rewriting the add-on image through the desired
/// deployment config's registry mirrors
pub fn image_mirror_values(
    getter: Arc<dyn DeploymentConfigGetter>,
    image_key: &str,
    image: &str,
) -> Arc<dyn GetValuesFn> {
    deployment_config_values(getter, vec![to_image_override_values(image_key, image)])
}

/// Wraps an agent add-on to honour the pause annotation
pub struct PolicyAgentAddon {
    inner: Arc<dyn AgentAddon>,
}

impl PolicyAgentAddon {
    /// Wrap `inner`
    pub fn new(inner: Arc<dyn AgentAddon>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl AgentAddon for PolicyAgentAddon {
    fn options(&self) -> &AgentAddonOptions {
        self.inner.options()
    }

    async fn values(
        &self,
        cluster: &ManagedCluster,
        addon: &ManagedClusterAddOn,
    ) -> policy_addon_common::Result<Values> {
        self.inner.values(cluster, addon).await
    }

    async fn manifests(
        &self,
        cluster: &ManagedCluster,
        addon: &ManagedClusterAddOn,
    ) -> policy_addon_common::Result<Vec<DynamicObject>> {
        if addon.annotation(POLICY_ADDON_PAUSE_ANNOTATION) == Some("true") {
            return Err(Error::paused(addon.name_any()));
        }
        self.inner.manifests(cluster, addon).await
    }
}

/// Install namespace from the hosted-mode spec or the desired deployment config
///
/// Hosted add-ons with `spec.installNamespace` use it. Otherwise the desired
/// deployment config's `agentInstallNamespace` applies; with neither the
/// result is empty and the framework default is used.
pub fn install_namespace_from_deployment_config(
    getter: Arc<dyn DeploymentConfigGetter>,
) -> Arc<dyn InstallNamespaceFn> {
    Arc::new(DeploymentConfigInstallNamespace { getter })
}

struct DeploymentConfigInstallNamespace {
    getter: Arc<dyn DeploymentConfigGetter>,
}

#[async_trait]
impl InstallNamespaceFn for DeploymentConfigInstallNamespace {
    async fn install_namespace(
        &self,
        addon: &ManagedClusterAddOn,
    ) -> policy_addon_common::Result<String> {
        if addon.hosting_cluster_name().is_some() {
            if let Some(namespace) = addon.install_namespace() {
                return Ok(namespace.to_string());
            }
        }

        match desired_deployment_config(addon, self.getter.as_ref()).await {
            Ok(config) => Ok(config
                .and_then(|config| config.spec.agent_install_namespace)
                .unwrap_or_default()),
            Err(e) => {
                error!(
                    addon = %addon.name_any(),
                    error = %e,
                    "failed to get deployment config for addon"
                );
                Err(e)
            }
        }
    }
}

/// Build an agent add-on, wrap it in [`PolicyAgentAddon`], and register it
pub fn get_and_add_agent<F>(
    manager: &dyn AddonManager,
    addon_name: &str,
    build: F,
) -> crate::Result<()>
where
    F: FnOnce() -> policy_addon_common::Result<Arc<dyn AgentAddon>>,
{
    let agent = build().map_err(|source| crate::Error::GetAgent {
        addon: addon_name.to_string(),
        source,
    })?;

    manager
        .add_agent(Arc::new(PolicyAgentAddon::new(agent)))
        .map_err(|source| crate::Error::AddAgent {
            addon: addon_name.to_string(),
            source,
        })
}
