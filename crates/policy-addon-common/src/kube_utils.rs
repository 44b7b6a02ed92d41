//! Kubernetes helpers for untyped manifests
//!
//! Rendered manifests arrive as JSON values with an explicit `apiVersion` and
//! `kind`; these helpers turn them into `DynamicObject`s plus the
//! `ApiResource` needed to address them.

use kube::api::{DynamicObject, GroupVersionKind};
use kube::discovery::ApiResource;
use serde_json::Value;

use crate::Error;

/// Irregular plurals for the kinds the add-ons render
const KIND_PLURALS: &[(&str, &str)] = &[
    ("rolebinding", "rolebindings"),
    ("clusterrolebinding", "clusterrolebindings"),
    ("networkpolicy", "networkpolicies"),
    ("podsecuritypolicy", "podsecuritypolicies"),
    ("endpoints", "endpoints"),
];

/// Parse apiVersion into (group, version)
///
/// # Examples
/// ```
/// use policy_addon_common::kube_utils::parse_api_version;
///
/// assert_eq!(parse_api_version("rbac.authorization.k8s.io/v1"), ("rbac.authorization.k8s.io".to_string(), "v1".to_string()));
/// assert_eq!(parse_api_version("v1"), (String::new(), "v1".to_string()));
/// ```
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Lowercase plural resource name for a kind
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();

    if let Some((_, plural)) = KIND_PLURALS.iter().find(|(singular, _)| *singular == lower) {
        return (*plural).to_string();
    }

    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

/// Build an ApiResource from a known apiVersion and kind
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk(&group, &version, kind),
        &pluralize_kind(kind),
    )
}

/// A manifest ready to be applied
#[derive(Debug, Clone)]
pub struct Manifest {
    /// The object
    pub object: DynamicObject,
    /// How to address it
    pub api_resource: ApiResource,
}

impl Manifest {
    /// Name of the object
    pub fn name(&self) -> &str {
        self.object.metadata.name.as_deref().unwrap_or_default()
    }

    /// Namespace of the object, if namespaced
    pub fn namespace(&self) -> Option<&str> {
        self.object.metadata.namespace.as_deref()
    }
}

/// Convert a JSON manifest into a [`Manifest`]
///
/// Requires `apiVersion`, `kind`, and `metadata.name`.
pub fn manifest_from_value(value: Value) -> Result<Manifest, Error> {
    let api_version = required_str(&value, "/apiVersion")?.to_string();
    let kind = required_str(&value, "/kind")?.to_string();
    required_str(&value, "/metadata/name")?;

    let object: DynamicObject = serde_json::from_value(value)
        .map_err(|e| Error::serialization_for_kind(kind.clone(), e.to_string()))?;

    Ok(Manifest {
        api_resource: build_api_resource(&api_version, &kind),
        object,
    })
}

fn required_str<'a>(value: &'a Value, pointer: &str) -> Result<&'a str, Error> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::serialization(format!("manifest missing {}", pointer)))
}
