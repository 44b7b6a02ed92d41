//! governance-policy-framework
//!
//! Values precedence, lowest first: the deployment config, cluster facts and
//! annotations, registry mirrors, the add-on values annotation, then
//! mandated values.

use std::sync::Arc;

use kube::ResourceExt;
use serde::Serialize;

use policy_addon_common::cluster::is_local_cluster;
use policy_addon_common::crd::{ConfigGroupResource, ManagedCluster, ManagedClusterAddOn};
use policy_addon_common::parse::equal_fold_bool;
use policy_addon_common::{to_values, Result, Values};
use policy_addon_framework::addon_values::values_from_addon_annotation;
use policy_addon_framework::deployment_config::{
    deployment_config_values, to_customized_variable_values, to_node_placement_values,
    to_resource_requirements_values, ToValuesFn,
};
use policy_addon_framework::{
    values_fn, AddonManager, AgentAddon, AgentAddonFactory, GetValuesFn, RegistrationOption,
};

use super::{
    image_mirror_values, install_namespace_from_deployment_config, mandate_values, CommonValues,
};
use crate::context::AddonContext;
use crate::listers::ManagedClusterLister;

/// Add-on name
pub const ADDON_NAME: &str = "governance-policy-framework";
/// Key under `global.imageOverrides`
pub const IMAGE_KEY: &str = "governance_policy_framework_addon";
/// Marks the agent as running on the hub itself
pub const ON_MULTICLUSTER_HUB_ANNOTATION: &str =
    "addon.open-cluster-management.io/on-multicluster-hub";
/// Set when the hub is imported into a global hub
pub const SYNC_POLICIES_ON_MULTICLUSTER_HUB_ANNOTATION: &str =
    "policy.open-cluster-management.io/sync-policies-on-multicluster-hub";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PolicyFrameworkValues {
    #[serde(flatten)]
    common: CommonValues,
    #[serde(skip_serializing_if = "is_false")]
    sync_policies_on_multicluster_hub: bool,
    #[serde(skip_serializing_if = "is_false")]
    on_multicluster_hub: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn values_from_annotations(
    cluster: &ManagedCluster,
    addon: &ManagedClusterAddOn,
    clusters: &dyn ManagedClusterLister,
    image: &str,
) -> Result<Values> {
    let mut values = PolicyFrameworkValues {
        common: CommonValues::new(IMAGE_KEY, image),
        sync_policies_on_multicluster_hub: false,
        on_multicluster_hub: false,
    };
    values.common.set_common_values(cluster, addon, clusters)?;

    if is_local_cluster(cluster, addon.hosting_cluster_name()) {
        values.on_multicluster_hub = true;
    }

    // add-on annotations override the cluster's
    for annotations in [cluster.annotations(), addon.annotations()] {
        if let Some(on_hub) = annotations
            .get(ON_MULTICLUSTER_HUB_ANNOTATION)
            .and_then(|raw| equal_fold_bool(raw))
        {
            values.on_multicluster_hub = on_hub;
        }
        if let Some(sync) = annotations
            .get(SYNC_POLICIES_ON_MULTICLUSTER_HUB_ANNOTATION)
            .and_then(|raw| equal_fold_bool(raw))
        {
            values.sync_policies_on_multicluster_hub = sync;
        }
    }

    values
        .common
        .set_common_values_from_annotations(addon, ADDON_NAME);

    to_values(&values)
}

/// Build the governance-policy-framework agent add-on
pub fn get_agent_addon(ctx: &AddonContext) -> Result<Arc<dyn AgentAddon>> {
    let registration = RegistrationOption::new(
        ADDON_NAME,
        ctx.config.permission_templates(ADDON_NAME)?,
        false,
        ctx.applier.clone(),
    );

    let clusters = ctx.clusters.clone();
    let image = ctx.config.governance_policy_framework_addon_image.clone();
    let annotation_values = {
        let image = image.clone();
        values_fn(move |cluster: &ManagedCluster, addon: &ManagedClusterAddOn| {
            values_from_annotations(cluster, addon, clusters.as_ref(), &image)
        })
    };

    let to_values_fns: Vec<ToValuesFn> = vec![
        Arc::new(to_node_placement_values),
        Arc::new(to_resource_requirements_values),
        Arc::new(to_customized_variable_values),
    ];
    let get_values_fns: Vec<Arc<dyn GetValuesFn>> = vec![
        deployment_config_values(ctx.deployment_configs.clone(), to_values_fns),
        annotation_values,
        image_mirror_values(ctx.deployment_configs.clone(), IMAGE_KEY, &image),
        values_fn(values_from_addon_annotation),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addon::testing::*;
    use crate::addon::POLICY_ADDON_PAUSE_ANNOTATION;
    use policy_addon_common::crd::KUBE_VERSION_CLAIM;
    use policy_addon_common::{ADDON_VALUES_ANNOTATION, LOCAL_CLUSTER_NAME};
    use policy_addon_framework::{AddonRegistry, InstallNamespaceFn};
    use serde_json::{json, Value};

    fn agent_with(getter: MockGetter, renderer: MockRenderer) -> Arc<dyn AgentAddon> {
        let hub = cluster(LOCAL_CLUSTER_NAME, &[("vendor", "OpenShift")], &[]);
        let (ctx, _dir) = context(clusters_lister(vec![hub]), addons_lister(&[]), getter, renderer);
        get_agent_addon(&ctx).unwrap()
    }

    fn annotated_cluster(name: &str, annotations: &[(&str, &str)]) -> ManagedCluster {
        let mut cluster = cluster(name, &[], &[]);
        cluster.metadata.annotations = Some(
            annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        cluster
    }

    #[tokio::test]
    async fn default_values_omit_hub_flags() {
        let agent = agent_with(getter_returning(None), MockRenderer::new());
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
                        "governance_policy_framework_addon":
                            "quay.io/ocm/governance-policy-framework-addon:latest"
                    }
                },
                "args": {"logEncoder": "console", "logLevel": 0, "pkgLogLevel": -1},
                "clusterName": "cluster1",
                "hubKubeConfigSecret": "governance-policy-framework-hub-kubeconfig",
                "installMode": "Default",
                "kubernetesDistribution": "",
                "prometheus": {"enabled": false}
            })
        );
    }

    #[tokio::test]
    async fn local_cluster_runs_on_hub() {
        let agent = agent_with(getter_returning(None), MockRenderer::new());

        let values = agent
            .values(
                &cluster(LOCAL_CLUSTER_NAME, &[], &[]),
                &addon(ADDON_NAME, LOCAL_CLUSTER_NAME, &[]),
            )
            .await
            .unwrap();
        assert_eq!(values["onMulticlusterHub"], true);

        let values = agent
            .values(
                &cluster("hub", &[(LOCAL_CLUSTER_NAME, "true")], &[]),
                &addon(ADDON_NAME, "hub", &[]),
            )
            .await
            .unwrap();
        assert_eq!(values["onMulticlusterHub"], true);
    }

    #[tokio::test]
    async fn hosted_on_local_cluster() {
        let agent = agent_with(getter_returning(None), MockRenderer::new());
        let values = agent
            .values(
                &cluster("cluster1", &[], &[]),
                &addon(ADDON_NAME, "cluster1", &[(HOSTING_ANNOTATION, LOCAL_CLUSTER_NAME)]),
            )
            .await
            .unwrap();

        assert_eq!(values["onMulticlusterHub"], true);
        assert_eq!(values["installMode"], "Hosted");
        assert_eq!(values["hostingKubernetesDistribution"], "OpenShift");
    }

    #[tokio::test]
    async fn addon_annotations_override_cluster_annotations() {
        let agent = agent_with(getter_returning(None), MockRenderer::new());
        let cluster = annotated_cluster(
            "cluster1",
            &[
                (ON_MULTICLUSTER_HUB_ANNOTATION, "TRUE"),
                (SYNC_POLICIES_ON_MULTICLUSTER_HUB_ANNOTATION, "true"),
            ],
        );

        let values = agent
            .values(&cluster, &addon(ADDON_NAME, "cluster1", &[]))
            .await
            .unwrap();
        assert_eq!(values["onMulticlusterHub"], true);
        assert_eq!(values["syncPoliciesOnMulticlusterHub"], true);

        let addon = addon(
            ADDON_NAME,
            "cluster1",
            &[
                (ON_MULTICLUSTER_HUB_ANNOTATION, "False"),
                (SYNC_POLICIES_ON_MULTICLUSTER_HUB_ANNOTATION, "yes"),
            ],
        );
        let values = agent.values(&cluster, &addon).await.unwrap();
        assert!(values.get("onMulticlusterHub").is_none());
        assert_eq!(values["syncPoliciesOnMulticlusterHub"], true);
    }

    #[tokio::test]
    async fn annotations_override_deployment_config() {
        let config = deployment_config(&[("logLevel", "5"), ("customSetting", "on")]);
        let agent = agent_with(getter_returning(Some(config)), MockRenderer::new());

        let values = agent
            .values(
                &cluster("cluster1", &[], &[(KUBE_VERSION_CLAIM, "v1.13.2")]),
                &addon_with_config(
                    ADDON_NAME,
                    "cluster1",
                    &[(ADDON_VALUES_ANNOTATION, r#"{"replicas": 2}"#)],
                ),
            )
            .await
            .unwrap();

        // generic customized variables land at the top level as strings
        assert_eq!(values["logLevel"], "5");
        assert_eq!(values["customSetting"], "on");
        assert_eq!(values["args"]["logLevel"], 0);
        assert_eq!(values["replicas"], 1);
    }

    #[tokio::test]
    async fn install_namespace_comes_from_deployment_config() {
        let agent = agent_with(
            getter_returning(Some(deployment_config_with_namespace("policy-agents"))),
            MockRenderer::new(),
        );
        let namespace_fn = agent.options().install_namespace.clone().unwrap();

        let namespace = namespace_fn
            .install_namespace(&addon_with_config(ADDON_NAME, "cluster1", &[]))
            .await
            .unwrap();
        assert_eq!(namespace, "policy-agents");
    }

    #[tokio::test]
    async fn paused_addon_skips_manifests() {
        let mut renderer = MockRenderer::new();
        renderer.expect_render().times(1).returning(|release, _| {
            Ok(vec![json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": {"name": "governance-policy-framework", "namespace": release.namespace}
            })])
        });

        let (ctx, _dir) = context(
            clusters_lister(vec![]),
            addons_lister(&[]),
            getter_returning(None),
            renderer,
        );
        let registry = AddonRegistry::new();
        get_and_add_agent(&registry, &ctx).unwrap();
        let agent = registry.get(ADDON_NAME).unwrap();

        let cluster = cluster("cluster1", &[], &[]);
        let manifests = agent
            .manifests(&cluster, &addon(ADDON_NAME, "cluster1", &[]))
            .await
            .unwrap();
        assert_eq!(manifests.len(), 1);
        assert_eq!(
            manifests[0].metadata.namespace.as_deref(),
            Some("open-cluster-management-agent-addon")
        );

        let paused = addon(ADDON_NAME, "cluster1", &[(POLICY_ADDON_PAUSE_ANNOTATION, "true")]);
        let err = agent.manifests(&cluster, &paused).await.unwrap_err();
        assert_eq!(err.addon(), Some(ADDON_NAME));
    }
}
