//! Errors raised while registering add-ons

use thiserror::Error;

/// Add-on registration error
#[derive(Debug, Error)]
pub enum Error {
    /// The agent add-on could not be built
    #[error("failed getting the {addon} agent addon: {source}")]
    GetAgent {
        /// Add-on name
        addon: String,
        /// Underlying failure
        #[source]
        source: policy_addon_common::Error,
    },

    /// The manager refused the agent add-on
    #[error("failed adding the {addon} agent addon to the manager: {source}")]
    AddAgent {
        /// Add-on name
        addon: String,
        /// Underlying failure
        #[source]
        source: policy_addon_common::Error,
    },
}

impl Error {
    /// Name of the add-on that failed
    pub fn addon(&self) -> &str {
        match self {
            Error::GetAgent { addon, .. } | Error::AddAgent { addon, .. } => addon,
        }
    }
}
