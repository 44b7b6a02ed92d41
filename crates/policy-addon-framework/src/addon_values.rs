//! Values carried directly on the ManagedClusterAddOn

use serde_json::Value;

use policy_addon_common::crd::{ManagedCluster, ManagedClusterAddOn};
use policy_addon_common::{Error, Result, Values, ADDON_VALUES_ANNOTATION};

/// Parse the `addon.open-cluster-management.io/values` annotation
///
/// A missing annotation contributes nothing. Anything other than a JSON
/// object is rejected.
pub fn values_from_addon_annotation(
    _cluster: &ManagedCluster,
    addon: &ManagedClusterAddOn,
) -> Result<Values> {
    let Some(raw) = addon.annotation(ADDON_VALUES_ANNOTATION) else {
        return Ok(Values::new());
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(values)) => Ok(values),
        Ok(_) => Err(Error::validation_for_field(
            addon.metadata.name.clone().unwrap_or_default(),
            ADDON_VALUES_ANNOTATION,
            "values annotation must be a JSON object",
        )),
        Err(e) => Err(Error::validation_for_field(
            addon.metadata.name.clone().unwrap_or_default(),
            ADDON_VALUES_ANNOTATION,
            format!("invalid values annotation: {}", e),
        )),
    }
}
