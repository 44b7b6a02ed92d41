//! Fixtures and mocks for the add-on tests

use std::collections::BTreeMap;
use std::sync::Arc;

use mockall::mock;
use serde_json::Value;

use policy_addon_common::crd::{
    AddOnDeploymentConfig, AddOnDeploymentConfigSpec, ClusterClaim, ConfigReference,
    ConfigSpecHash, CustomizedVariable, ManagedCluster, ManagedClusterAddOn,
    ManagedClusterAddOnSpec, ManagedClusterAddOnStatus, ManagedClusterSpec, ManagedClusterStatus,
};
use policy_addon_common::kube_utils::Manifest;
use policy_addon_common::{Result, Values, ADDON_API_GROUP, HOSTING_CLUSTER_NAME_ANNOTATION};
use policy_addon_framework::{ChartRenderer, DeploymentConfigGetter, ManifestApplier, ReleaseInfo};

use crate::config::{AddonConfig, PERMISSION_FILES};
use crate::context::AddonContext;
use crate::listers::{MockManagedClusterAddOnLister, MockManagedClusterLister};

pub const HOSTING_ANNOTATION: &str = HOSTING_CLUSTER_NAME_ANNOTATION;
pub const CONFIG_NAMESPACE: &str = "open-cluster-management";
pub const CONFIG_NAME: &str = "policy-config";

mock! {
    pub Renderer {}

    impl ChartRenderer for Renderer {
        fn render(&self, release: &ReleaseInfo, values: &Values) -> Result<Vec<Value>>;
    }
}

mock! {
    pub Getter {}

    #[async_trait::async_trait]
    impl DeploymentConfigGetter for Getter {
        async fn get(&self, namespace: &str, name: &str) -> Result<Option<AddOnDeploymentConfig>>;
    }
}

mock! {
    pub Applier {}

    #[async_trait::async_trait]
    impl ManifestApplier for Applier {
        async fn apply(&self, manifest: &Manifest) -> Result<()>;
    }
}

fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn cluster(name: &str, labels: &[(&str, &str)], claims: &[(&str, &str)]) -> ManagedCluster {
    let mut cluster = ManagedCluster::new(name, ManagedClusterSpec::default());
    cluster.metadata.labels = Some(string_map(labels));
    cluster.status = Some(ManagedClusterStatus {
        cluster_claims: claims
            .iter()
            .map(|(name, value)| ClusterClaim {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect(),
        version: None,
    });
    cluster
}

pub fn cluster_with_claims(name: &str, claims: &[(&str, &str)]) -> ManagedCluster {
    cluster(name, &[], claims)
}

pub fn addon(name: &str, namespace: &str, annotations: &[(&str, &str)]) -> ManagedClusterAddOn {
    let mut addon = ManagedClusterAddOn::new(name, ManagedClusterAddOnSpec::default());
    addon.metadata.namespace = Some(namespace.to_string());
    addon.metadata.annotations = Some(string_map(annotations));
    addon
}

/// Add-on whose desired deployment config is `CONFIG_NAMESPACE/CONFIG_NAME`
pub fn addon_with_config(
    name: &str,
    namespace: &str,
    annotations: &[(&str, &str)],
) -> ManagedClusterAddOn {
    let mut addon = addon(name, namespace, annotations);
    addon.status = Some(ManagedClusterAddOnStatus {
        config_references: vec![ConfigReference {
            group: ADDON_API_GROUP.to_string(),
            resource: "addondeploymentconfigs".to_string(),
            name: CONFIG_NAME.to_string(),
            namespace: Some(CONFIG_NAMESPACE.to_string()),
            desired_config: Some(ConfigSpecHash {
                name: CONFIG_NAME.to_string(),
                namespace: Some(CONFIG_NAMESPACE.to_string()),
                spec_hash: "hash".to_string(),
            }),
        }],
    });
    addon
}

pub fn deployment_config_from(spec: AddOnDeploymentConfigSpec) -> AddOnDeploymentConfig {
    let mut config = AddOnDeploymentConfig::new(CONFIG_NAME, spec);
    config.metadata.namespace = Some(CONFIG_NAMESPACE.to_string());
    config
}

pub fn deployment_config(variables: &[(&str, &str)]) -> AddOnDeploymentConfig {
    deployment_config_from(AddOnDeploymentConfigSpec {
        customized_variables: variables
            .iter()
            .map(|(name, value)| CustomizedVariable {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect(),
        ..Default::default()
    })
}

pub fn deployment_config_with_namespace(namespace: &str) -> AddOnDeploymentConfig {
    deployment_config_from(AddOnDeploymentConfigSpec {
        agent_install_namespace: Some(namespace.to_string()),
        ..Default::default()
    })
}

/// Getter always returning `config` for the desired reference
pub fn getter_returning(config: Option<AddOnDeploymentConfig>) -> MockGetter {
    let mut getter = MockGetter::new();
    getter
        .expect_get()
        .returning(move |_, _| Ok(config.clone()));
    getter
}

/// Cluster lister that knows the given clusters
pub fn clusters_lister(clusters: Vec<ManagedCluster>) -> MockManagedClusterLister {
    let mut lister = MockManagedClusterLister::new();
    lister.expect_get_cluster().returning(move |name| {
        clusters
            .iter()
            .find(|c| c.metadata.name.as_deref() == Some(name))
            .cloned()
            .map(Arc::new)
    });
    lister
}

/// Add-on lister that knows the given (namespace, name) pairs
pub fn addons_lister(existing: &[(&str, &str)]) -> MockManagedClusterAddOnLister {
    let existing: Vec<(String, String)> = existing
        .iter()
        .map(|(ns, name)| (ns.to_string(), name.to_string()))
        .collect();
    let mut lister = MockManagedClusterAddOnLister::new();
    lister.expect_get_addon().returning(move |namespace, name| {
        existing
            .iter()
            .any(|(ns, n)| ns == namespace && n == name)
            .then(|| Arc::new(addon(name, namespace, &[])))
    });
    lister
}

/// Context with permission templates on disk; keep the returned dir alive
pub fn context(
    clusters: MockManagedClusterLister,
    addons: MockManagedClusterAddOnLister,
    getter: MockGetter,
    renderer: MockRenderer,
) -> (AddonContext, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    for addon_name in [
        "cert-policy-controller",
        "config-policy-controller",
        "iam-policy-controller",
        "governance-policy-framework",
    ] {
        let permissions = dir.path().join(addon_name).join("hubpermissions");
        std::fs::create_dir_all(&permissions).expect("create permissions dir");
        for file in PERMISSION_FILES {
            std::fs::write(permissions.join(file), "kind: Placeholder\n").expect("write template");
        }
    }

    let config = AddonConfig {
        cert_policy_controller_image: "quay.io/ocm/cert-policy-controller:latest".to_string(),
        config_policy_controller_image: "quay.io/ocm/config-policy-controller:latest".to_string(),
        iam_policy_controller_image: "quay.io/ocm/iam-policy-controller:latest".to_string(),
        governance_policy_framework_addon_image:
            "quay.io/ocm/governance-policy-framework-addon:latest".to_string(),
        manifests_dir: dir.path().to_path_buf(),
    };

    let ctx = AddonContext {
        config,
        clusters: Arc::new(clusters),
        addons: Arc::new(addons),
        deployment_configs: Arc::new(getter),
        applier: Arc::new(MockApplier::new()),
        renderer: Arc::new(renderer),
    };
    (ctx, dir)
}
