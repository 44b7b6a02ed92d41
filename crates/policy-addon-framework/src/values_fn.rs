//! Values functions: one source of Helm values for an add-on

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use policy_addon_common::crd::{ManagedCluster, ManagedClusterAddOn};
use policy_addon_common::{Result, Values};

/// Produce values for one (cluster, add-on) pair
///
/// Implemented for plain functions and closures with the matching signature,
/// so most sources are written as ordinary `fn`s.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GetValuesFn: Send + Sync {
    /// Compute the values contributed by this source
    async fn values(&self, cluster: &ManagedCluster, addon: &ManagedClusterAddOn)
        -> Result<Values>;
}

#[async_trait]
impl<F> GetValuesFn for F
where
    F: Fn(&ManagedCluster, &ManagedClusterAddOn) -> Result<Values> + Send + Sync,
{
    async fn values(
        &self,
        cluster: &ManagedCluster,
        addon: &ManagedClusterAddOn,
    ) -> Result<Values> {
        self(cluster, addon)
    }
}

/// Box a synchronous values function
pub fn values_fn<F>(f: F) -> Arc<dyn GetValuesFn>
where
    F: Fn(&ManagedCluster, &ManagedClusterAddOn) -> Result<Values> + Send + Sync + 'static,
{
    Arc::new(f)
}
