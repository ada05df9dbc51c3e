use thiserror::Error;

/// Result type for analyzer calls
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Failure reported by an [`Analyzer`](crate::Analyzer) for one chunk of text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerError {
    /// The analyzer rejected the text
    #[error("Analysis failed: {0}")]
    Failed(String),

    /// The analyzer backend could not be reached
    #[error("Analyzer unavailable: {0}")]
    Unavailable(String),
}

impl AnalyzerError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// The analyzer's own message, without the variant prefix
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::Failed(msg) | Self::Unavailable(msg) => msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_drops_variant_prefix() {
        let err = AnalyzerError::failed("refused");
        assert_eq!(err.to_string(), "Analysis failed: refused");
        assert_eq!(err.reason(), "refused");
        assert_eq!(AnalyzerError::unavailable("timeout").reason(), "timeout");
    }
}
