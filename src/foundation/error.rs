/// Convenience result type used across sheetplay.
pub type SheetResult<T> = Result<T, SheetError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum SheetError {
    /// The sprite-sheet source could not be read or decoded.
    #[error("source load error: {0}")]
    SourceLoad(String),

    /// The layout selector is not one of the supported grid topologies.
    #[error("unsupported layout: {0}")]
    UnsupportedLayout(String),

    /// Invalid user-provided configuration or playback parameters.
    #[error("validation error: {0}")]
    Validation(String),

    /// An output surface could not be created or addressed.
    #[error("surface error: {0}")]
    Surface(String),

    /// Frame analysis did not finish within its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Errors while exporting rendered frames.
    #[error("encode error: {0}")]
    Encode(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SheetError {
    /// Build a [`SheetError::SourceLoad`] value.
    pub fn source_load(msg: impl Into<String>) -> Self {
        Self::SourceLoad(msg.into())
    }

    /// Build a [`SheetError::UnsupportedLayout`] value.
    pub fn unsupported_layout(msg: impl Into<String>) -> Self {
        Self::UnsupportedLayout(msg.into())
    }

    /// Build a [`SheetError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`SheetError::Surface`] value.
    pub fn surface(msg: impl Into<String>) -> Self {
        Self::Surface(msg.into())
    }

    /// Build a [`SheetError::Timeout`] value.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Build a [`SheetError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`SheetError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            SheetError::source_load("x")
                .to_string()
                .contains("source load error:")
        );
        assert!(
            SheetError::unsupported_layout("grid-3x3")
                .to_string()
                .contains("unsupported layout: grid-3x3")
        );
        assert!(
            SheetError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(SheetError::surface("x").to_string().contains("surface error:"));
        assert!(SheetError::timeout("x").to_string().contains("timeout:"));
        assert!(SheetError::encode("x").to_string().contains("encode error:"));
        assert!(
            SheetError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = SheetError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
