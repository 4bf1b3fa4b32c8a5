use crate::model::LocationId;

/// Failures surfaced by the sync service. Drift is not an error; it is only logged.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Location not found with id: {0}")]
    NotFound(LocationId),

    #[error("Failed to fetch weather data: {0}")]
    UpstreamUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Location {name}, {country} already exists")]
    Duplicate { name: String, country: String },
}

impl SyncError {
    /// Only upstream failures are worth retrying; the rest will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::UpstreamUnavailable(_))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_upstream_failures_are_retryable() {
        assert!(SyncError::UpstreamUnavailable("timeout".into()).is_retryable());
        assert!(!SyncError::NotFound(3).is_retryable());
        assert!(!SyncError::InvalidInput("lat".into()).is_retryable());
    }

    #[test]
    fn messages_name_the_subject() {
        assert_eq!(SyncError::NotFound(42).to_string(), "Location not found with id: 42");
        let dup = SyncError::Duplicate { name: "Paris".into(), country: "FR".into() };
        assert_eq!(dup.to_string(), "Location Paris, FR already exists");
    }
}
