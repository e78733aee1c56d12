use thiserror::Error;

use super::session::AttemptPhase;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    #[error("operation requires phase {expected:?}, attempt is {actual:?}")]
    WrongPhase { expected: AttemptPhase, actual: AttemptPhase },
    #[error("assessment {0} is already completed")]
    NotAttemptable(String),
    #[error("assessment {0} has no questions")]
    NoQuestions(String),
    #[error("current question has not been answered")]
    NotAnswered,
    #[error("finish is only available on the last question")]
    NotLastQuestion,
    #[error("already on the last question; use finish")]
    LastQuestion,
    #[error("another submission is in flight")]
    Busy,
    #[error("nothing to retry")]
    NothingToRetry,
    #[error("choice {index} is out of range ({count} choices)")]
    ChoiceOutOfRange { index: usize, count: usize },
    #[error("operation does not apply to a {0} question")]
    WrongAnswerKind(&'static str),
    #[error("answer mode is already fixed to {0}")]
    ModeLocked(&'static str),
    #[error("answer mode has not been chosen")]
    ModeNotChosen,
    #[error("invalid image: {0}")]
    InvalidImage(String),
}
