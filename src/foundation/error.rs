/// Convenience result type used across dyelot.
pub type DyelotResult<T> = Result<T, DyelotError>;

/// Top-level error taxonomy used by the resolver, compositor and controller.
#[derive(thiserror::Error, Debug)]
pub enum DyelotError {
    /// Invalid caller-provided parameters or manifest data.
    #[error("validation error: {0}")]
    Validation(String),

    /// A layer resource could not be fetched or decoded.
    #[error("asset load failure: {0}")]
    AssetLoad(String),

    /// Compositing or encoding failed.
    #[error("render failure: {0}")]
    Render(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DyelotError {
    /// Build a [`DyelotError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`DyelotError::AssetLoad`] value.
    pub fn asset_load(msg: impl Into<String>) -> Self {
        Self::AssetLoad(msg.into())
    }

    /// Build a [`DyelotError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`DyelotError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
