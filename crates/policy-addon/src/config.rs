//! Controller configuration read from the environment

use std::path::PathBuf;

use policy_addon_framework::PermissionTemplate;

/// Environment variable naming the directory holding per-add-on manifests
pub const MANIFESTS_DIR_ENV: &str = "POLICY_ADDON_MANIFESTS_DIR";

/// Manifest directory used when [`MANIFESTS_DIR_ENV`] is unset
pub const DEFAULT_MANIFESTS_DIR: &str = "manifests";

/// Permission templates under `<manifests_dir>/<addon>/hubpermissions/`, in apply order
pub const PERMISSION_FILES: [&str; 2] = ["role.yaml", "rolebinding.yaml"];

/// Controller configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddonConfig {
    /// Image for cert-policy-controller (`CERT_POLICY_CONTROLLER_IMAGE`)
    pub cert_policy_controller_image: String,
    /// Image for config-policy-controller (`CONFIG_POLICY_CONTROLLER_IMAGE`)
    pub config_policy_controller_image: String,
    /// Image for iam-policy-controller (`IAM_POLICY_CONTROLLER_IMAGE`)
    pub iam_policy_controller_image: String,
    /// Image for governance-policy-framework (`GOVERNANCE_POLICY_FRAMEWORK_ADDON_IMAGE`)
    pub governance_policy_framework_addon_image: String,
    /// Root of the per-add-on manifest directories
    pub manifests_dir: PathBuf,
}

impl Default for AddonConfig {
    fn default() -> Self {
        Self {
            cert_policy_controller_image: String::new(),
            config_policy_controller_image: String::new(),
            iam_policy_controller_image: String::new(),
            governance_policy_framework_addon_image: String::new(),
            manifests_dir: PathBuf::from(DEFAULT_MANIFESTS_DIR),
        }
    }
}

impl AddonConfig {
    /// Load from the process environment; unset images are empty
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let image = |key: &str| lookup(key).unwrap_or_default();
        Self {
            cert_policy_controller_image: image("CERT_POLICY_CONTROLLER_IMAGE"),
            config_policy_controller_image: image("CONFIG_POLICY_CONTROLLER_IMAGE"),
            iam_policy_controller_image: image("IAM_POLICY_CONTROLLER_IMAGE"),
            governance_policy_framework_addon_image: image(
                "GOVERNANCE_POLICY_FRAMEWORK_ADDON_IMAGE",
            ),
            manifests_dir: lookup(MANIFESTS_DIR_ENV)
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFESTS_DIR)),
        }
    }

    /// Directory with the hub permission templates of `addon_name`
    pub fn permissions_dir(&self, addon_name: &str) -> PathBuf {
        self.manifests_dir.join(addon_name).join("hubpermissions")
    }

    /// Load the hub permission templates of `addon_name`
    pub fn permission_templates(
        &self,
        addon_name: &str,
    ) -> policy_addon_common::Result<Vec<PermissionTemplate>> {
        let dir = self.permissions_dir(addon_name);
        PERMISSION_FILES
            .iter()
            .map(|file| PermissionTemplate::from_file(&dir.join(file)))
            .collect()
    }
}
