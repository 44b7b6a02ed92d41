//! AddOnDeploymentConfig lookup and its built-in values functions
//!
//! The hub resolves which AddOnDeploymentConfig applies to each
//! ManagedClusterAddOn and records it in `status.configReferences`. The
//! values functions here read that desired config and translate its fields
//! into Helm values.

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::Api;
use kube::Client;
#[cfg(test)]
use mockall::automock;
use serde_json::{json, Value};
use tracing::debug;

use policy_addon_common::crd::{
    AddOnDeploymentConfig, ConfigGroupResource, ManagedCluster, ManagedClusterAddOn,
};
use policy_addon_common::values::set_path;
use policy_addon_common::{merge_values, to_values, Error, Result, Values};

use crate::values_fn::GetValuesFn;

/// Fetches AddOnDeploymentConfigs from the hub
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DeploymentConfigGetter: Send + Sync {
    /// Get a config by namespace and name; `Ok(None)` if it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<AddOnDeploymentConfig>>;
}

/// [`DeploymentConfigGetter`] backed by the kube API
#[derive(Clone)]
pub struct KubeDeploymentConfigGetter {
    client: Client,
}

impl KubeDeploymentConfigGetter {
    /// Create a getter using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeploymentConfigGetter for KubeDeploymentConfigGetter {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<AddOnDeploymentConfig>> {
        let api: Api<AddOnDeploymentConfig> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }
}

/// The AddOnDeploymentConfig the hub wants applied to `addon`
///
/// `None` when no deployment config is referenced or the hub has not
/// resolved it yet (empty spec hash). A referenced config that does not
/// exist is an error.
pub async fn desired_deployment_config(
    addon: &ManagedClusterAddOn,
    getter: &dyn DeploymentConfigGetter,
) -> Result<Option<AddOnDeploymentConfig>> {
    let desired = addon
        .config_reference(&ConfigGroupResource::addon_deployment_config())
        .and_then(|reference| reference.desired_config.as_ref())
        .filter(|desired| !desired.name.is_empty() && !desired.spec_hash.is_empty());

    let Some(desired) = desired else {
        return Ok(None);
    };

    let namespace = desired.namespace.as_deref().unwrap_or_default();
    match getter.get(namespace, &desired.name).await? {
        Some(config) => Ok(Some(config)),
        None => Err(Error::not_found(
            "AddOnDeploymentConfig",
            format!("{}/{}", namespace, desired.name),
        )),
    }
}

/// Converts a deployment config into values
pub type ToValuesFn = Arc<dyn Fn(&AddOnDeploymentConfig) -> Result<Values> + Send + Sync>;

/// Values function that applies `to_values_fns`, in order, to the desired config
pub fn deployment_config_values(
    getter: Arc<dyn DeploymentConfigGetter>,
    to_values_fns: Vec<ToValuesFn>,
) -> Arc<dyn GetValuesFn> {
    Arc::new(DeploymentConfigValues {
        getter,
        to_values_fns,
    })
}

struct DeploymentConfigValues {
    getter: Arc<dyn DeploymentConfigGetter>,
    to_values_fns: Vec<ToValuesFn>,
}

#[async_trait]
impl GetValuesFn for DeploymentConfigValues {
    async fn values(
        &self,
        _cluster: &ManagedCluster,
        addon: &ManagedClusterAddOn,
    ) -> Result<Values> {
        let mut values = Values::new();
        let Some(config) = desired_deployment_config(addon, self.getter.as_ref()).await? else {
            return Ok(values);
        };

        debug!(
            config = %kube::ResourceExt::name_any(&config),
            "applying deployment config values"
        );
        for to_values_fn in &self.to_values_fns {
            merge_values(&mut values, to_values_fn(&config)?);
        }
        Ok(values)
    }
}

/// `global.nodeSelector` and `tolerations` from the node placement
pub fn to_node_placement_values(config: &AddOnDeploymentConfig) -> Result<Values> {
    let mut values = Values::new();
    let Some(placement) = &config.spec.node_placement else {
        return Ok(values);
    };

    if !placement.node_selector.is_empty() {
        set_path(
            &mut values,
            "global.nodeSelector",
            serde_json::to_value(&placement.node_selector)?,
        );
    }
    if !placement.tolerations.is_empty() {
        values.insert(
            "tolerations".to_string(),
            serde_json::to_value(&placement.tolerations)?,
        );
    }
    Ok(values)
}

/// `global.resourceRequirements` from the per-container requirements
///
/// Container IDs (`<kind>:<name>:<container>`, `*` as wildcard) become
/// anchored regular expressions.
pub fn to_resource_requirements_values(config: &AddOnDeploymentConfig) -> Result<Values> {
    let mut values = Values::new();
    if config.spec.resource_requirements.is_empty() {
        return Ok(values);
    }

    let requirements = config
        .spec
        .resource_requirements
        .iter()
        .map(|item| -> Result<Value> {
            let resources = serde_json::to_value(&item.resources)?;
            Ok(json!({
                "containerIDRegex": format!("^{}$", item.container_id.replace('*', ".*")),
                "resources": resources,
            }))
        })
        .collect::<Result<Vec<Value>>>()?;

    set_path(
        &mut values,
        "global.resourceRequirements",
        Value::Array(requirements),
    );
    Ok(values)
}

/// `global.proxyConfig` from the proxy settings; unset entries are omitted
pub fn to_proxy_config_values(config: &AddOnDeploymentConfig) -> Result<Values> {
    let mut values = Values::new();
    let Some(proxy) = &config.spec.proxy_config else {
        return Ok(values);
    };

    for (key, value) in [
        ("HTTP_PROXY", &proxy.http_proxy),
        ("HTTPS_PROXY", &proxy.https_proxy),
        ("NO_PROXY", &proxy.no_proxy),
    ] {
        if !value.is_empty() {
            set_path(&mut values, &format!("global.proxyConfig.{}", key), json!(value));
        }
    }
    Ok(values)
}

/// Every customized variable as a top-level string value
pub fn to_customized_variable_values(config: &AddOnDeploymentConfig) -> Result<Values> {
    to_values(&config.customized_variables())
}

/// `global.imageOverrides.<image_key>` rewritten through the registry mirrors
///
/// A registry replaces the image's `source` prefix with its `mirror`; an
/// empty source keeps only the last path segment of the image. When several
/// registries match, the last one wins. Nothing is emitted when no mirror
/// applies.
pub fn to_image_override_values(
    image_key: impl Into<String>,
    default_image: impl Into<String>,
) -> ToValuesFn {
    let image_key = image_key.into();
    let default_image = default_image.into();
    Arc::new(move |config: &AddOnDeploymentConfig| {
        let mut values = Values::new();
        if let Some(image) = mirrored_image(config, &default_image) {
            set_path(
                &mut values,
                &format!("global.imageOverrides.{}", image_key),
                Value::String(image),
            );
        }
        Ok(values)
    })
}

fn mirrored_image(config: &AddOnDeploymentConfig, image: &str) -> Option<String> {
    config.spec.registries.iter().fold(None, |found, registry| {
        match mirror_image(&registry.source, &registry.mirror, image) {
            Some(mirrored) if mirrored != image => Some(mirrored),
            _ => found,
        }
    })
}

fn mirror_image(source: &str, mirror: &str, image: &str) -> Option<String> {
    let source = source.trim_end_matches('/');
    let mirror = mirror.trim_end_matches('/');

    if source.is_empty() {
        let name_tag = image.rsplit('/').next().unwrap_or(image);
        if mirror.is_empty() {
            return Some(name_tag.to_string());
        }
        return Some(format!("{}/{}", mirror, name_tag));
    }

    image
        .strip_prefix(source)
        .map(|rest| format!("{}{}", mirror, rest))
}
