use thiserror::Error;

/// Errors raised by the alignment and windowing core.
///
/// Only structural problems live here. Missing reference rates, unmapped
/// groups and short or gapped windows are data conditions and surface as
/// null outputs instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    /// Unparseable field, missing column, duplicate rule or misaligned inputs.
    #[error("malformed input ({location}): {message}")]
    MalformedInput { location: String, message: String },

    /// A run parameter outside its allowed range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SeriesError {
    pub fn malformed(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<SeriesError> for AppError {
    fn from(err: SeriesError) -> Self {
        Self::new(2, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_errors_map_to_input_exit_code() {
        let err: AppError = SeriesError::malformed("prices.csv:4", "bad timestamp 'x'").into();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "malformed input (prices.csv:4): bad timestamp 'x'");
    }
}
