//! cert-policy-controller
//!
//! Values precedence, lowest first: cluster facts and annotations, the
//! add-on values annotation, then the deployment config (node placement,
//! resource requirements, registry mirrors, customized variables).

use std::sync::Arc;

use serde_json::json;

use policy_addon_common::crd::{
    AddOnDeploymentConfig, ConfigGroupResource, ManagedCluster, ManagedClusterAddOn,
};
use policy_addon_common::{to_values, Result, Values};
use policy_addon_framework::addon_values::values_from_addon_annotation;
use policy_addon_framework::deployment_config::{
    deployment_config_values, to_image_override_values, to_node_placement_values,
    to_resource_requirements_values, ToValuesFn,
};
use policy_addon_framework::{
    values_fn, AddonManager, AgentAddon, AgentAddonFactory, GetValuesFn, RegistrationOption,
};

use super::{
    common_values_from_customized_variables, install_namespace_from_deployment_config,
    log_unsupported_variable, CommonValues,
};
use crate::context::AddonContext;
use crate::listers::ManagedClusterLister;

/// Add-on name
pub const ADDON_NAME: &str = "cert-policy-controller";
/// Key under `global.imageOverrides`
pub const IMAGE_KEY: &str = "cert_policy_controller";

fn values_from_annotations(
    cluster: &ManagedCluster,
    addon: &ManagedClusterAddOn,
    clusters: &dyn ManagedClusterLister,
    image: &str,
) -> Result<Values> {
    let mut values = CommonValues::new(IMAGE_KEY, image);
    values.set_common_values(cluster, addon, clusters)?;
    values.set_common_values_from_annotations(addon, ADDON_NAME);
    to_values(&values)
}

fn values_from_customized_variables(config: &AddOnDeploymentConfig) -> Result<Values> {
    let (mut values, remaining) = common_values_from_customized_variables(config, ADDON_NAME);
    for (name, value) in remaining {
        match name.as_str() {
            "managedKubeConfigSecret" => {
                values.insert(name, json!(value));
            }
            _ => log_unsupported_variable(ADDON_NAME, &name, &value),
        }
    }
    Ok(values)
}

/// Build the cert-policy-controller agent add-on
pub fn get_agent_addon(ctx: &AddonContext) -> Result<Arc<dyn AgentAddon>> {
    let registration = RegistrationOption::new(
        ADDON_NAME,
        ctx.config.permission_templates(ADDON_NAME)?,
        false,
        ctx.applier.clone(),
    );

    let clusters = ctx.clusters.clone();
    let image = ctx.config.cert_policy_controller_image.clone();
    let annotation_values = {
        let image = image.clone();
        values_fn(move |cluster: &ManagedCluster, addon: &ManagedClusterAddOn| {
            values_from_annotations(cluster, addon, clusters.as_ref(), &image)
        })
    };

    let to_values_fns: Vec<ToValuesFn> = vec![
        Arc::new(to_node_placement_values),
        Arc::new(to_resource_requirements_values),
        to_image_override_values(IMAGE_KEY, image),
        Arc::new(values_from_customized_variables),
    ];
    let get_values_fns: Vec<Arc<dyn GetValuesFn>> = vec![
        annotation_values,
        values_fn(values_from_addon_annotation),
        deployment_config_values(ctx.deployment_configs.clone(), to_values_fns),
    ];

    let agent = AgentAddonFactory::new(ADDON_NAME)
        .with_config_gvrs(vec![ConfigGroupResource::addon_deployment_config()])
        .with_get_values_fns(get_values_fns)
        .with_agent_registration_option(registration)
        .with_agent_install_namespace(install_namespace_from_deployment_config(
            ctx.deployment_configs.clone(),
        ))
        .with_hosted_mode_enabled()
        .with_chart_renderer(ctx.renderer.clone())
        .build_helm_agent_addon()?;

    Ok(Arc::new(agent))
}

/// Build the add-on and register it with `manager`
pub fn get_and_add_agent(manager: &dyn AddonManager, ctx: &AddonContext) -> crate::Result<()> {
    super::get_and_add_agent(manager, ADDON_NAME, || get_agent_addon(ctx))
}
