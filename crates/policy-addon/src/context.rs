//! Shared collaborators handed to every add-on builder

use std::sync::Arc;

use kube::Client;

use policy_addon_common::crd::{ManagedCluster, ManagedClusterAddOn};
use policy_addon_framework::deployment_config::KubeDeploymentConfigGetter;
use policy_addon_framework::registration::KubeManifestApplier;
use policy_addon_framework::{ChartRenderer, DeploymentConfigGetter, ManifestApplier};

use crate::config::AddonConfig;
use crate::listers::{spawn_reflector, ManagedClusterAddOnLister, ManagedClusterLister};

/// Everything an add-on builder needs from the outside world
#[derive(Clone)]
pub struct AddonContext {
    /// Controller configuration
    pub config: AddonConfig,
    /// Cached ManagedClusters
    pub clusters: Arc<dyn ManagedClusterLister>,
    /// Cached ManagedClusterAddOns
    pub addons: Arc<dyn ManagedClusterAddOnLister>,
    /// AddOnDeploymentConfig reads
    pub deployment_configs: Arc<dyn DeploymentConfigGetter>,
    /// Applies hub permission manifests
    pub applier: Arc<dyn ManifestApplier>,
    /// Renders the chart of the add-on named in the release
    pub renderer: Arc<dyn ChartRenderer>,
}

impl AddonContext {
    /// Wire the context to a hub cluster
    ///
    /// Starts the ManagedCluster and ManagedClusterAddOn reflectors; must be
    /// called within a tokio runtime.
    pub fn from_client(
        client: Client,
        config: AddonConfig,
        renderer: Arc<dyn ChartRenderer>,
    ) -> Self {
        Self {
            config,
            clusters: Arc::new(spawn_reflector::<ManagedCluster>(client.clone())),
            addons: Arc::new(spawn_reflector::<ManagedClusterAddOn>(client.clone())),
            deployment_configs: Arc::new(KubeDeploymentConfigGetter::new(client.clone())),
            applier: Arc::new(KubeManifestApplier::new(client)),
            renderer,
        }
    }
}
