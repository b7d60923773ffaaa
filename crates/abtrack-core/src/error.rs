use thiserror::Error;

/// Failure outcomes of the collect entry point.
///
/// `Validation` and `UnknownAction` are client-attributable. `Store` wraps any
/// failure reported by the [`EventStore`](crate::store::EventStore)
/// collaborator and is never retried here. `MalformedInput` covers request
/// bodies that do not parse as a JSON object of the expected shape.
/// `TimeOutOfRange` is a server-side fault in window or expiry arithmetic.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("{0}")]
    Validation(String),

    #[error("Unknown action: {}", .0.as_deref().unwrap_or("<missing>"))]
    UnknownAction(Option<String>),

    #[error("{0}")]
    Store(#[source] anyhow::Error),

    /// A timestamp derived from the clock and a configured span left the
    /// representable range.
    #[error("{0}")]
    TimeOutOfRange(String),

    #[error("malformed request body: {0}")]
    MalformedInput(#[from] serde_json::Error),
}

impl CollectError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// `true` for the variants a caller caused and can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::UnknownAction(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_action_message_names_the_action() {
        let err = CollectError::UnknownAction(Some("frobnicate".to_string()));
        assert_eq!(err.to_string(), "Unknown action: frobnicate");
        assert!(err.is_client_error());
    }

    #[test]
    fn unknown_action_message_when_missing() {
        let err = CollectError::UnknownAction(None);
        assert_eq!(err.to_string(), "Unknown action: <missing>");
    }

    #[test]
    fn store_errors_are_not_client_errors() {
        let err = CollectError::Store(anyhow::anyhow!("throttled"));
        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "throttled");
    }
}
