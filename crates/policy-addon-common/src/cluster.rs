//! Cluster inspection helpers

use kube::ResourceExt;

use crate::crd::{ManagedCluster, KUBE_VERSION_CLAIM, PRODUCT_CLAIM};
use crate::LOCAL_CLUSTER_NAME;

/// Distribution name reported for OpenShift clusters
pub const OPENSHIFT_VENDOR: &str = "OpenShift";

/// Vendor of the cluster's Kubernetes distribution
///
/// The `vendor` label only counts when it is exactly `OpenShift` (it may hold
/// values like `auto-detect`). The product cluster claim overrides it.
pub fn cluster_vendor(cluster: &ManagedCluster) -> String {
    if let Some(product) = cluster.claim(PRODUCT_CLAIM) {
        return product.to_string();
    }

    match cluster.labels().get("vendor") {
        Some(vendor) if vendor == OPENSHIFT_VENDOR => OPENSHIFT_VENDOR.to_string(),
        _ => String::new(),
    }
}

/// Whether the cluster runs a Kubernetes too old for current leader election (< 1.14)
pub fn is_old_kubernetes(cluster: &ManagedCluster) -> bool {
    cluster
        .claim(KUBE_VERSION_CLAIM)
        .and_then(parse_major_minor)
        .is_some_and(|(major, minor)| major <= 1 && minor < 14)
}

/// Whether the cluster is the hub itself (or hosted on it)
pub fn is_local_cluster(cluster: &ManagedCluster, hosting_cluster_name: Option<&str>) -> bool {
    cluster.name_any() == LOCAL_CLUSTER_NAME
        || hosting_cluster_name == Some(LOCAL_CLUSTER_NAME)
        || cluster
            .labels()
            .get(LOCAL_CLUSTER_NAME)
            .is_some_and(|v| v == "true")
}

/// Tolerant `major.minor` parse of a version string
///
/// Accepts a leading `v`, a missing minor or patch, and pre-release/build
/// suffixes (`v1.27.3+k3s1`, `1.13.0-rc.1`).
fn parse_major_minor(version: &str) -> Option<(u64, u64)> {
    let trimmed = version.trim().trim_start_matches(['v', 'V']);
    let core = trimmed
        .split(['-', '+'])
        .next()
        .filter(|core| !core.is_empty())?;

    let mut parts = core.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(minor) => minor.parse().ok()?,
        None => 0,
    };
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ClusterClaim, ManagedClusterSpec, ManagedClusterStatus};
    use std::collections::BTreeMap;

    fn cluster(name: &str, labels: &[(&str, &str)], claims: &[(&str, &str)]) -> ManagedCluster {
        let mut cluster = ManagedCluster::new(name, ManagedClusterSpec::default());
        cluster.metadata.labels = Some(
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
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

    #[test]
    fn vendor_from_label_only_when_openshift() {
        assert_eq!(cluster_vendor(&cluster("c", &[("vendor", "OpenShift")], &[])), "OpenShift");
        assert_eq!(cluster_vendor(&cluster("c", &[("vendor", "auto-detect")], &[])), "");
        assert_eq!(cluster_vendor(&cluster("c", &[], &[])), "");
    }

    #[test]
    fn vendor_claim_overrides_label() {
        let c = cluster("c", &[("vendor", "OpenShift")], &[(PRODUCT_CLAIM, "EKS")]);
        assert_eq!(cluster_vendor(&c), "EKS");

        let c = cluster("c", &[("vendor", "auto-detect")], &[(PRODUCT_CLAIM, "OpenShift")]);
        assert_eq!(cluster_vendor(&c), "OpenShift");
    }

    #[test]
    fn old_kubernetes_detection() {
        let old = |v: &str| is_old_kubernetes(&cluster("c", &[], &[(KUBE_VERSION_CLAIM, v)]));
        assert!(old("v1.13.0"));
        assert!(old("1.11"));
        assert!(old("v1.13.4+k3s1"));
        assert!(!old("v1.14.0"));
        assert!(!old("v1.29.3"));
        assert!(!old("v2.1.0"));
        assert!(!old("not-a-version"));
        assert!(!is_old_kubernetes(&cluster("c", &[], &[])));
    }

    #[test]
    fn local_cluster_detection() {
        assert!(is_local_cluster(&cluster("local-cluster", &[], &[]), None));
        assert!(is_local_cluster(&cluster("hub", &[("local-cluster", "true")], &[]), None));
        assert!(is_local_cluster(&cluster("c2", &[], &[]), Some("local-cluster")));
        assert!(!is_local_cluster(&cluster("c2", &[("local-cluster", "false")], &[]), Some("other")));
    }

    #[test]
    fn major_minor_parsing() {
        assert_eq!(parse_major_minor("v1.27.3"), Some((1, 27)));
        assert_eq!(parse_major_minor("1"), Some((1, 0)));
        assert_eq!(parse_major_minor("1.13.0-rc.1"), Some((1, 13)));
        assert_eq!(parse_major_minor(""), None);
        assert_eq!(parse_major_minor("v"), None);
        assert_eq!(parse_major_minor("x.y"), None);
    }
}
