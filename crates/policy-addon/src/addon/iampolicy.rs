//! iam-policy-controller
//!
//! Only image, proxy, and log-level settings apply; the deployment config
//! contributes node placement and registry mirrors.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use policy_addon_common::crd::{ConfigGroupResource, ManagedCluster, ManagedClusterAddOn};
use policy_addon_common::parse::log_level;
use policy_addon_common::{to_values, Result, Values};
use policy_addon_framework::addon_values::values_from_addon_annotation;
use policy_addon_framework::deployment_config::{
    deployment_config_values, to_node_placement_values, ToValuesFn,
};
use policy_addon_framework::{
    values_fn, AddonManager, AgentAddon, AgentAddonFactory, GetValuesFn, RegistrationOption,
};

use super::{image_mirror_values, GlobalValues, UserArgs, POLICY_LOG_LEVEL_ANNOTATION};
use crate::context::AddonContext;

/// Add-on name
pub const ADDON_NAME: &str = "iam-policy-controller";
/// Key under `global.imageOverrides`
pub const IMAGE_KEY: &str = "iam_policy_controller";

#[derive(Serialize)]
struct IamPolicyValues {
    global: GlobalValues,
    args: UserArgs,
}

fn values_from_annotations(addon: &ManagedClusterAddOn, image: &str) -> Result<Values> {
    let mut global = GlobalValues::new(IMAGE_KEY, image);
    global.proxy_config = BTreeMap::from(
        ["HTTP_PROXY", "HTTPS_PROXY", "NO_PROXY"].map(|key| (key.to_string(), String::new())),
    );

    let mut args = UserArgs::default();
    if let Some(raw) = addon.annotation(POLICY_LOG_LEVEL_ANNOTATION) {
        args.set_log_level(log_level(POLICY_LOG_LEVEL_ANNOTATION, ADDON_NAME, raw));
    }

    to_values(&IamPolicyValues { global, args })
}

/// Build the iam-policy-controller agent add-on
pub fn get_agent_addon(ctx: &AddonContext) -> Result<Arc<dyn AgentAddon>> {
    let registration = RegistrationOption::new(
        ADDON_NAME,
        ctx.config.permission_templates(ADDON_NAME)?,
        false,
        ctx.applier.clone(),
    );

    let image = ctx.config.iam_policy_controller_image.clone();
    let annotation_values = {
        let image = image.clone();
        values_fn(move |_: &ManagedCluster, addon: &ManagedClusterAddOn| {
            values_from_annotations(addon, &image)
        })
    };

    let to_values_fns: Vec<ToValuesFn> = vec![Arc::new(to_node_placement_values)];
    let get_values_fns: Vec<Arc<dyn GetValuesFn>> = vec![
        deployment_config_values(ctx.deployment_configs.clone(), to_values_fns),
        annotation_values,
        image_mirror_values(ctx.deployment_configs.clone(), IMAGE_KEY, &image),
        values_fn(values_from_addon_annotation),
    ];

    let agent = AgentAddonFactory::new(ADDON_NAME)
        .with_config_gvrs(vec![ConfigGroupResource::addon_deployment_config()])
        .with_get_values_fns(get_values_fns)
        .with_agent_registration_option(registration)
        .with_hosted_mode_enabled()
        .with_chart_renderer(ctx.renderer.clone())
        .build_helm_agent_addon()?;

    Ok(Arc::new(agent))
}

/// Build the add-on and register it with `manager`
pub fn get_and_add_agent(manager: &dyn AddonManager, ctx: &AddonContext) -> crate::Result<()> {
    super::get_and_add_agent(manager, ADDON_NAME, || get_agent_addon(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addon::testing::*;
    use k8s_openapi::api::core::v1::Toleration;
    use policy_addon_common::crd::{AddOnDeploymentConfigSpec, ImageMirror, NodePlacement};
    use policy_addon_common::ADDON_VALUES_ANNOTATION;
    use serde_json::{json, Value};

    fn agent_with(getter: MockGetter) -> Arc<dyn AgentAddon> {
        let (ctx, _dir) = context(
            clusters_lister(vec![]),
            addons_lister(&[]),
            getter,
            MockRenderer::new(),
        );
        get_agent_addon(&ctx).unwrap()
    }

    #[tokio::test]
    async fn default_values() {
        let agent = agent_with(getter_returning(None));
        let values = agent
            .values(&cluster("cluster1", &[], &[]), &addon(ADDON_NAME, "cluster1", &[]))
            .await
            .unwrap();

        assert_eq!(
            Value::Object(values),
            json!({
                "global": {
                    "imagePullPolicy": "IfNotPresent",
                    "imagePullSecret": "open-cluster-management-image-pull-credentials",
                    "imageOverrides": {
                        "iam_policy_controller": "quay.io/ocm/iam-policy-controller:latest"
                    },
                    "proxyConfig": {"HTTP_PROXY": "", "HTTPS_PROXY": "", "NO_PROXY": ""}
                },
                "args": {"logEncoder": "console", "logLevel": 0, "pkgLogLevel": -1}
            })
        );
    }

    #[tokio::test]
    async fn log_level_annotation() {
        let agent = agent_with(getter_returning(None));
        let values = agent
            .values(
                &cluster("cluster1", &[], &[]),
                &addon(ADDON_NAME, "cluster1", &[(POLICY_LOG_LEVEL_ANNOTATION, "error")]),
            )
            .await
            .unwrap();
        assert_eq!(values["args"]["logLevel"], -1);
        assert_eq!(values["args"]["pkgLogLevel"], -3);
    }

    #[tokio::test]
    async fn node_placement_and_mirrors_from_deployment_config() {
        let config = deployment_config_from(AddOnDeploymentConfigSpec {
            node_placement: Some(NodePlacement {
                node_selector: [("infra".to_string(), "true".to_string())].into(),
                tolerations: vec![Toleration {
                    key: Some("dedicated".to_string()),
                    operator: Some("Exists".to_string()),
                    ..Default::default()
                }],
            }),
            registries: vec![ImageMirror {
                source: "quay.io/ocm".to_string(),
                mirror: "mirror.example.com/ocm".to_string(),
            }],
            ..Default::default()
        });
        let agent = agent_with(getter_returning(Some(config)));

        let values = agent
            .values(
                &cluster("cluster1", &[], &[]),
                &addon_with_config(ADDON_NAME, "cluster1", &[]),
            )
            .await
            .unwrap();

        assert_eq!(values["global"]["nodeSelector"], json!({"infra": "true"}));
        assert_eq!(
            values["tolerations"],
            json!([{"key": "dedicated", "operator": "Exists"}])
        );
        assert_eq!(
            values["global"]["imageOverrides"]["iam_policy_controller"],
            "mirror.example.com/ocm/iam-policy-controller:latest"
        );
    }

    #[tokio::test]
    async fn values_annotation_wins() {
        let agent = agent_with(getter_returning(None));
        let values = agent
            .values(
                &cluster("cluster1", &[], &[]),
                &addon(
                    ADDON_NAME,
                    "cluster1",
                    &[(ADDON_VALUES_ANNOTATION, r#"{"global": {"imagePullPolicy": "Always"}}"#)],
                ),
            )
            .await
            .unwrap();
        assert_eq!(values["global"]["imagePullPolicy"], "Always");
        assert_eq!(values["global"]["imagePullSecret"], crate::addon::IMAGE_PULL_SECRET);
    }

    #[test]
    fn options() {
        let agent = agent_with(MockGetter::new());
        let options = agent.options();
        assert_eq!(options.addon_name, ADDON_NAME);
        assert!(options.hosted_mode_enabled);
        assert!(options.install_namespace.is_none());
        assert!(options.registration.is_some());
    }
}
