//! Add-on framework for hub-managed agents
//!
//! An add-on is described by an [`AgentAddonFactory`]: an ordered list of
//! values functions, the configuration types it accepts, how it registers
//! with the hub, and where its agent is installed. The factory builds a
//! [`HelmAgentAddon`] which merges the values and hands them to a
//! [`ChartRenderer`].

#![deny(missing_docs)]

pub mod addon_values;
pub mod agent;
pub mod deployment_config;
pub mod factory;
pub mod manager;
pub mod registration;
pub mod values_fn;

pub use agent::{AgentAddon, AgentAddonOptions, InstallNamespaceFn};
pub use deployment_config::{DeploymentConfigGetter, KubeDeploymentConfigGetter, ToValuesFn};
pub use factory::{AgentAddonFactory, ChartRenderer, HelmAgentAddon, ReleaseInfo};
pub use manager::{AddonManager, AddonRegistry};
pub use registration::{ManifestApplier, PermissionTemplate, RegistrationOption};
pub use values_fn::{values_fn, GetValuesFn};
