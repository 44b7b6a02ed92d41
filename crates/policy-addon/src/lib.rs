//! Governance policy add-ons
//!
//! Builds the four policy agent add-ons (cert, config, and IAM policy
//! controllers plus the policy framework) and registers them with an
//! [`AddonManager`](policy_addon_framework::AddonManager).

#![deny(missing_docs)]

pub mod addon;
pub mod config;
pub mod context;
pub mod error;
pub mod listers;

pub use config::AddonConfig;
pub use context::AddonContext;
pub use error::Error;

use policy_addon_framework::AddonManager;

/// Result type alias for add-on registration
pub type Result<T> = std::result::Result<T, Error>;

/// Build every policy add-on and register it with `manager`
///
/// Stops at the first add-on that fails.
pub fn add_all_agents(manager: &dyn AddonManager, ctx: &AddonContext) -> Result<()> {
    addon::certpolicy::get_and_add_agent(manager, ctx)?;
    addon::configpolicy::get_and_add_agent(manager, ctx)?;
    addon::iampolicy::get_and_add_agent(manager, ctx)?;
    addon::policyframework::get_and_add_agent(manager, ctx)?;
    Ok(())
}
