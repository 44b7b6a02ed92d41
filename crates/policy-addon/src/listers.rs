//! Cached reads of hub resources
//!
//! Values functions run on every reconcile, so cluster and add-on lookups go
//! through watcher-backed reflector stores instead of the API server.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use futures::StreamExt;
use kube::api::Api;
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Client, Resource};
#[cfg(test)]
use mockall::automock;
use serde::de::DeserializeOwned;
use tracing::warn;

use policy_addon_common::crd::{ManagedCluster, ManagedClusterAddOn};

/// Read access to ManagedClusters
#[cfg_attr(test, automock)]
pub trait ManagedClusterLister: Send + Sync {
    /// ManagedCluster by name
    fn get_cluster(&self, name: &str) -> Option<Arc<ManagedCluster>>;
}

/// Read access to ManagedClusterAddOns
#[cfg_attr(test, automock)]
pub trait ManagedClusterAddOnLister: Send + Sync {
    /// ManagedClusterAddOn by cluster namespace and name
    fn get_addon(&self, namespace: &str, name: &str) -> Option<Arc<ManagedClusterAddOn>>;
}

impl ManagedClusterLister for Store<ManagedCluster> {
    fn get_cluster(&self, name: &str) -> Option<Arc<ManagedCluster>> {
        self.get(&ObjectRef::new(name))
    }
}

impl ManagedClusterAddOnLister for Store<ManagedClusterAddOn> {
    fn get_addon(&self, namespace: &str, name: &str) -> Option<Arc<ManagedClusterAddOn>> {
        self.get(&ObjectRef::new(name).within(namespace))
    }
}

/// Start a reflector over every `K` on the hub and return its store
///
/// The watch runs on the tokio runtime until the process exits; watch errors
/// are logged and retried with backoff.
pub fn spawn_reflector<K>(client: Client) -> Store<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
{
    let api: Api<K> = Api::all(client);
    let (reader, writer) = reflector::store();
    let stream = reflector::reflector(writer, watcher(api, watcher::Config::default()))
        .default_backoff()
        .touched_objects();

    tokio::spawn(async move {
        tokio::pin!(stream);
        while let Some(event) = stream.next().await {
            if let Err(e) = event {
                warn!(
                    kind = %K::kind(&K::DynamicType::default()),
                    error = %e,
                    "watch error"
                );
            }
        }
    });

    reader
}
