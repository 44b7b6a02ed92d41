//! Hub registration for agent add-ons
//!
//! An agent authenticates to the hub with a client certificate whose subject
//! places it in per-cluster and per-add-on groups. The permission templates
//! grant those groups access to hub resources: they are rendered with the
//! cluster name and group, then server-side applied in the cluster namespace.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::{Client, ResourceExt};
use minijinja::{context, Environment, UndefinedBehavior};
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use policy_addon_common::crd::ManagedCluster;
use policy_addon_common::kube_utils::{manifest_from_value, Manifest};
use policy_addon_common::yaml::parse_yaml_multi;
use policy_addon_common::{Error, Result};

/// Signer for agent client certificates used against the hub API server
pub const KUBE_CLIENT_SIGNER_NAME: &str = "kubernetes.io/kube-apiserver-client";

/// Field manager for permission manifests
pub const FIELD_MANAGER: &str = "governance-policy-addon-controller";

/// Groups an agent certificate is issued with: per-cluster, per-add-on, authenticated
pub fn default_groups(cluster_name: &str, addon_name: &str) -> [String; 3] {
    [
        format!(
            "system:open-cluster-management:cluster:{}:addon:{}",
            cluster_name, addon_name
        ),
        format!("system:open-cluster-management:addon:{}", addon_name),
        "system:authenticated".to_string(),
    ]
}

/// Certificate subject requested by an agent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subject {
    /// Certificate common name
    pub user: String,
    /// Certificate organizations
    pub groups: Vec<String>,
}

/// One certificate the agent requests from the hub
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignerConfiguration {
    /// Signer that issues the certificate
    pub signer_name: String,
    /// Requested subject
    pub subject: Subject,
}

/// Client certificate configuration for talking to the hub API server
pub fn kube_client_signer_configuration(
    cluster_name: &str,
    addon_name: &str,
    agent_name: &str,
) -> SignerConfiguration {
    let [cluster_group, addon_group, _] = default_groups(cluster_name, addon_name);
    SignerConfiguration {
        signer_name: KUBE_CLIENT_SIGNER_NAME.to_string(),
        subject: Subject {
            user: format!(
                "system:open-cluster-management:cluster:{}:addon:{}:agent:{}",
                cluster_name, addon_name, agent_name
            ),
            groups: vec![cluster_group, addon_group],
        },
    }
}

/// Applies a rendered manifest to the hub
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ManifestApplier: Send + Sync {
    /// Create or update the object
    async fn apply(&self, manifest: &Manifest) -> Result<()>;
}

/// Server-side apply through the kube client
pub struct KubeManifestApplier {
    client: Client,
    field_manager: String,
}

impl KubeManifestApplier {
    /// Create an applier using the default field manager
    pub fn new(client: Client) -> Self {
        Self {
            client,
            field_manager: FIELD_MANAGER.to_string(),
        }
    }
}

#[async_trait]
impl ManifestApplier for KubeManifestApplier {
    async fn apply(&self, manifest: &Manifest) -> Result<()> {
        let api: Api<DynamicObject> = match manifest.namespace() {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &manifest.api_resource),
            None => Api::all_with(self.client.clone(), &manifest.api_resource),
        };
        let params = PatchParams::apply(&self.field_manager).force();
        api.patch(manifest.name(), &params, &Patch::Apply(&manifest.object))
            .await?;
        Ok(())
    }
}

/// A hub permission manifest template
///
/// Templates see two variables: `cluster_name` and `group`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionTemplate {
    /// Template name used in errors
    pub name: String,
    /// Template source
    pub source: String,
}

impl PermissionTemplate {
    /// Template from an in-memory source
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Read a template file
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            Error::template(
                path.display().to_string(),
                format!("failed to read template: {}", e),
            )
        })?;
        Ok(Self::new(path.display().to_string(), source))
    }
}

/// How an agent add-on registers with the hub
pub struct RegistrationOption {
    addon_name: String,
    agent_name: String,
    templates: Vec<PermissionTemplate>,
    use_cluster_role: bool,
    applier: Arc<dyn ManifestApplier>,
    env: Environment<'static>,
}

impl RegistrationOption {
    /// Registration for `addon_name`, whose agent is also named `addon_name`
    pub fn new(
        addon_name: impl Into<String>,
        templates: Vec<PermissionTemplate>,
        use_cluster_role: bool,
        applier: Arc<dyn ManifestApplier>,
    ) -> Self {
        let addon_name = addon_name.into();
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self {
            agent_name: addon_name.clone(),
            addon_name,
            templates,
            use_cluster_role,
            applier,
            env,
        }
    }

    /// Certificates the agent on `cluster_name` requests
    pub fn csr_configurations(&self, cluster_name: &str) -> Vec<SignerConfiguration> {
        vec![kube_client_signer_configuration(
            cluster_name,
            &self.addon_name,
            &self.agent_name,
        )]
    }

    /// Group the permission templates bind to
    ///
    /// The per-cluster group normally; the add-on wide group when the
    /// templates bind a ClusterRole shared by every cluster.
    pub fn permission_group(&self, cluster_name: &str) -> String {
        let [cluster_group, addon_group, _] = default_groups(cluster_name, &self.addon_name);
        if self.use_cluster_role {
            addon_group
        } else {
            cluster_group
        }
    }

    /// Render every permission template for `cluster_name`
    pub fn render_permissions(&self, cluster_name: &str) -> Result<Vec<Manifest>> {
        let group = self.permission_group(cluster_name);
        let mut manifests = Vec::new();
        for template in &self.templates {
            let rendered = self
                .env
                .render_str(
                    &template.source,
                    context! { cluster_name => cluster_name, group => &group },
                )
                .map_err(|e| Error::template(&template.name, e.to_string()))?;
            for doc in parse_yaml_multi(&rendered)? {
                manifests.push(manifest_from_value(doc)?);
            }
        }
        Ok(manifests)
    }

    /// Grant the agent on `cluster` its hub permissions
    ///
    /// Stops at the first manifest that fails to apply.
    pub async fn permission_config(&self, cluster: &ManagedCluster) -> Result<()> {
        let cluster_name = cluster.name_any();
        for manifest in self.render_permissions(&cluster_name)? {
            self.applier.apply(&manifest).await?;
            debug!(
                addon = %self.addon_name,
                cluster = %cluster_name,
                kind = %manifest.api_resource.kind,
                name = %manifest.name(),
                "applied hub permission"
            );
        }
        Ok(())
    }
}
