//! config-policy-controller
//!
//! Values precedence, lowest first: cluster facts and annotations (including
//! the standalone hub templating secret and OperatorPolicy support), the
//! add-on values annotation, the deployment config, then mandated values.

use std::sync::Arc;

use kube::ResourceExt;
use serde::Serialize;
use serde_json::json;

use policy_addon_common::crd::{
    AddOnDeploymentConfig, ConfigGroupResource, ManagedCluster, ManagedClusterAddOn,
};
use policy_addon_common::parse::{bool_or_default, parse_bool};
use policy_addon_common::values::set_path;
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
    log_ignored_variable, log_unsupported_variable, mandate_values, CommonValues,
};
use crate::context::AddonContext;
use crate::listers::{ManagedClusterAddOnLister, ManagedClusterLister};

/// Add-on name
pub const ADDON_NAME: &str = "config-policy-controller";
/// Key under `global.imageOverrides`
pub const IMAGE_KEY: &str = "config_policy_controller";
/// Set to a boolean to disable OperatorPolicy support
pub const OPERATOR_POLICY_DISABLED_ANNOTATION: &str = "operator-policy-disabled";
/// Add-on whose presence in the cluster namespace enables hub templating on the agent
pub const STANDALONE_TEMPLATING_ADDON_NAME: &str = "governance-standalone-hub-templating";

/// Default number of policies evaluated in parallel
pub const DEFAULT_EVALUATION_CONCURRENCY: u8 = 2;
/// Default client queries per second
pub const DEFAULT_CLIENT_QPS: u8 = 30;
/// Default client burst
pub const DEFAULT_CLIENT_BURST: u8 = 45;

const OPENSHIFT_MAJOR_VERSION_LABEL: &str = "openshiftVersion-major";
const OPERATOR_POLICY_DEFAULT_NAMESPACE: &str = "openshift-operators";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigPolicyValues {
    #[serde(flatten)]
    common: CommonValues,
    #[serde(skip_serializing_if = "String::is_empty")]
    standalone_hub_templating_secret: String,
    operator_policy: OperatorPolicyValues,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OperatorPolicyValues {
    disabled: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    default_namespace: String,
}

impl ConfigPolicyValues {
    fn new(image: &str) -> Self {
        let mut common = CommonValues::new(IMAGE_KEY, image);
        common.args.evaluation_concurrency = Some(DEFAULT_EVALUATION_CONCURRENCY);
        common.args.client_qps = Some(DEFAULT_CLIENT_QPS);
        common.args.client_burst = Some(DEFAULT_CLIENT_BURST);
        Self {
            common,
            standalone_hub_templating_secret: String::new(),
            operator_policy: OperatorPolicyValues {
                disabled: false,
                default_namespace: String::new(),
            },
        }
    }
}

fn values_from_annotations(
    cluster: &ManagedCluster,
    addon: &ManagedClusterAddOn,
    clusters: &dyn ManagedClusterLister,
    addons: &dyn ManagedClusterAddOnLister,
    image: &str,
) -> Result<Values> {
    let mut values = ConfigPolicyValues::new(image);
    values.common.set_common_values(cluster, addon, clusters)?;

    let namespace = addon.namespace().unwrap_or_default();
    if addons
        .get_addon(&namespace, STANDALONE_TEMPLATING_ADDON_NAME)
        .is_some()
    {
        values.standalone_hub_templating_secret =
            format!("{}-hub-kubeconfig", STANDALONE_TEMPLATING_ADDON_NAME);
    }

    if cluster.labels().get(OPENSHIFT_MAJOR_VERSION_LABEL).map(String::as_str) == Some("4") {
        values.operator_policy.default_namespace = OPERATOR_POLICY_DEFAULT_NAMESPACE.to_string();
    } else {
        values.operator_policy.disabled = true;
    }

    values
        .common
        .set_common_values_from_annotations(addon, ADDON_NAME);

    if let Some(raw) = addon.annotation(OPERATOR_POLICY_DISABLED_ANNOTATION) {
        values.operator_policy.disabled = bool_or_default(
            OPERATOR_POLICY_DISABLED_ANNOTATION,
            ADDON_NAME,
            raw,
            values.operator_policy.disabled,
        );
    }

    to_values(&values)
}

fn values_from_customized_variables(config: &AddOnDeploymentConfig) -> Result<Values> {
    let (mut values, remaining) = common_values_from_customized_variables(config, ADDON_NAME);
    for (name, value) in remaining {
        match name.as_str() {
            "operatorPolicyDisabled" => match parse_bool(&value) {
                Ok(disabled) => set_path(&mut values, "operatorPolicy.disabled", json!(disabled)),
                Err(_) => log_ignored_variable(ADDON_NAME, &name, &value),
            },
            "managedKubeConfigSecret" => {
                values.insert(name, json!(value));
            }
            _ => log_unsupported_variable(ADDON_NAME, &name, &value),
        }
    }
    Ok(values)
}

/// Build the config-policy-controller agent add-on
pub fn get_agent_addon(ctx: &AddonContext) -> Result<Arc<dyn AgentAddon>> {
    let registration = RegistrationOption::new(
        ADDON_NAME,
        ctx.config.permission_templates(ADDON_NAME)?,
        false,
        ctx.applier.clone(),
    );

    let clusters = ctx.clusters.clone();
    let addons = ctx.addons.clone();
    let image = ctx.config.config_policy_controller_image.clone();
    let annotation_values = {
        let image = image.clone();
        values_fn(move |cluster: &ManagedCluster, addon: &ManagedClusterAddOn| {
            values_from_annotations(cluster, addon, clusters.as_ref(), addons.as_ref(), &image)
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
        values_fn(mandate_values),
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
