//! Timeline errors

/// Error type produced by a failing action body
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of executing a single action
pub type ActionResult = Result<(), ActionError>;

/// Timeline errors
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("Action '{action_id}' failed: {source}")]
    ActionFailed {
        action_id: String,
        #[source]
        source: ActionError,
    },

    #[error("Timeline cancelled")]
    Cancelled,
}

impl TimelineError {
    /// Wrap an action failure
    pub fn action_failed(action_id: impl Into<String>, source: ActionError) -> Self {
        Self::ActionFailed {
            action_id: action_id.into(),
            source,
        }
    }

    /// Check if this error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
