/// Convenience result type used across layercast.
pub type LayercastResult<T> = Result<T, LayercastError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Only [`LayercastError::is_fatal`] errors abort a compositing run. Everything else is raised at a
/// layer processor boundary, logged, and turned into "this layer is missing from the output".
#[derive(thiserror::Error, Debug)]
pub enum LayercastError {
    /// Invalid caller-provided configuration (canvas, layer list, options).
    #[error("validation error: {0}")]
    Validation(String),

    /// Failure while resolving a single layer to pixels.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// No candidate in a font family list resolved to a loadable font.
    #[error("font resolution error: no usable font for \"{family}\"")]
    FontResolution {
        /// The comma-separated family list that was requested.
        family: String,
    },

    /// A widget layer referenced a name that is not registered.
    #[error("widget \"{name}\" not found in registry (available: {})", .available.join(", "))]
    WidgetNotFound {
        /// Requested widget name.
        name: String,
        /// Names that are registered, in registration order.
        available: Vec<String>,
    },

    /// Remote source could not be fetched.
    #[error("fetch error for {url}: {reason}")]
    Fetch {
        /// URL that was requested.
        url: String,
        /// Human readable cause.
        reason: String,
    },

    /// Cache tier failure. Never fatal; callers log and recompute.
    #[error("cache error: {0}")]
    Cache(String),

    /// The caller-side deadline for a compositing run elapsed.
    #[error("timeout: compositing did not finish within {0:?}")]
    Timeout(std::time::Duration),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LayercastError {
    /// Build a [`LayercastError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`LayercastError::Evaluation`] value.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// Build a [`LayercastError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build a [`LayercastError::Cache`] value.
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Build a [`LayercastError::Fetch`] value.
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Return `true` for errors that abort a whole compositing run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Timeout(_))
    }

    /// Structured, user-facing description of this error.
    pub fn report(&self) -> ErrorReport {
        let details = match self {
            Self::Validation(_) => Some("check canvas dimensions and the layer list".to_owned()),
            Self::Timeout(_) => Some("the composite was abandoned; retrying may hit warm caches".to_owned()),
            _ => None,
        };
        ErrorReport {
            error: self.to_string(),
            details,
        }
    }
}

/// Serializable error body handed to whatever front end wraps the compositor.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ErrorReport {
    /// Human readable reason.
    pub error: String,
    /// Optional hint for the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
