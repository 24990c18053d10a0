//! Presentation errors

use rf_cascade::{IngestError, PresenterError};
use rf_timeline::TimelineError;

#[derive(Debug, thiserror::Error)]
pub enum PresentationError {
    #[error("Timeline error: {0}")]
    Timeline(TimelineError),

    #[error("Presenter error: {0}")]
    Presenter(#[from] PresenterError),

    #[error("Invalid spin payload: {0}")]
    Ingest(#[from] IngestError),

    #[error("Controller destroyed")]
    Destroyed,

    #[error("Config error: {0}")]
    Config(String),
}

impl From<TimelineError> for PresentationError {
    /// Unwrap presenter failures carried through a timeline action
    fn from(err: TimelineError) -> Self {
        match err {
            TimelineError::ActionFailed { action_id, source } => {
                match source.downcast::<PresenterError>() {
                    Ok(presenter) => Self::Presenter(*presenter),
                    Err(source) => Self::Timeline(TimelineError::ActionFailed { action_id, source }),
                }
            }
            other => Self::Timeline(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_cascade::GridSize;
    use rf_timeline::ActionError;

    #[test]
    fn test_presenter_failure_is_unwrapped() {
        let source: ActionError = Box::new(PresenterError::GridMismatch {
            step_index: 1,
            expected: GridSize::new(3, 5),
            found: GridSize::new(4, 5),
        });
        let err = PresentationError::from(TimelineError::action_failed("callback_7", source));
        assert!(matches!(err, PresentationError::Presenter(PresenterError::GridMismatch { .. })));
    }

    #[test]
    fn test_other_failures_stay_timeline_errors() {
        let source: ActionError = "boom".into();
        let err = PresentationError::from(TimelineError::action_failed("callback_8", source));
        assert!(matches!(
            err,
            PresentationError::Timeline(TimelineError::ActionFailed { .. })
        ));
        assert!(matches!(
            PresentationError::from(TimelineError::Cancelled),
            PresentationError::Timeline(TimelineError::Cancelled)
        ));
    }
}
