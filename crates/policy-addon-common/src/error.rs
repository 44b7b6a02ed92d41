//! Error types for the governance policy add-ons
//!
//! Errors carry the add-on or resource they concern so that a failed values
//! computation can be traced back to the cluster and add-on being processed.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for add-on operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// A user-supplied value could not be accepted
    #[error("validation error for {addon}: {message}")]
    Validation {
        /// Add-on whose input is invalid
        addon: String,
        /// Description of what's invalid
        message: String,
        /// Annotation or customized variable holding the bad value
        field: Option<String>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// A referenced resource does not exist
    #[error("{kind} {name} not found")]
    NotFound {
        /// Resource kind
        kind: String,
        /// Resource name (namespace/name for namespaced resources)
        name: String,
    },

    /// Template rendering error
    #[error("template error [{template}]: {message}")]
    Template {
        /// Template file being rendered
        template: String,
        /// Description of what failed
        message: String,
    },

    /// The add-on is paused and must not produce manifests
    #[error("the Policy Addon controller is paused due to the policy-addon-pause annotation on {addon}")]
    Paused {
        /// Name of the paused add-on
        addon: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "registration", "factory")
        context: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            addon: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error for an add-on and the field holding the bad value
    pub fn validation_for_field(
        addon: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            addon: addon.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a not-found error
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a template error for the named template
    pub fn template(template: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Template {
            template: template.into(),
            message: msg.into(),
        }
    }

    /// Create a paused error for the named add-on
    pub fn paused(addon: impl Into<String>) -> Self {
        Self::Paused {
            addon: addon.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Bad user input, templates, and a paused add-on need someone to change a
    /// resource before another attempt can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::Validation { .. } => false,
            Error::Serialization { .. } => false,
            Error::NotFound { .. } => true,
            Error::Template { .. } => false,
            Error::Paused { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Get the add-on name if this error is associated with a specific add-on
    pub fn addon(&self) -> Option<&str> {
        match self {
            Error::Validation { addon, .. } => Some(addon),
            Error::Paused { addon } => Some(addon),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(err.to_string())
    }
}
