use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessmentKind {
    #[serde(rename = "Assignment", alias = "assignment", alias = "ASSIGNMENT")]
    Assignment,
    #[serde(rename = "CAT", alias = "cat", alias = "Cat")]
    Cat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssessmentStatus {
    #[serde(rename = "start", alias = "Start", alias = "not_started", alias = "not-started")]
    Start,
    #[serde(
        rename = "in-progress",
        alias = "in_progress",
        alias = "In Progress",
        alias = "inprogress"
    )]
    InProgress,
    #[serde(rename = "completed", alias = "Completed", alias = "complete")]
    Completed,
}

impl AssessmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }

    /// Only assessments that have not been completed can be (re)entered.
    pub fn is_attemptable(self) -> bool {
        matches!(self, Self::Start | Self::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionsType {
    #[serde(rename = "open-ended", alias = "open_ended", alias = "open")]
    OpenEnded,
    #[serde(
        rename = "close-ended",
        alias = "closed-ended",
        alias = "close_ended",
        alias = "closed_ended",
        alias = "closed"
    )]
    CloseEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseEndedType {
    #[serde(
        rename = "multiple choice with single answer",
        alias = "single",
        alias = "single-answer",
        alias = "single_answer"
    )]
    SingleAnswer,
    #[serde(
        rename = "multiple choice with multiple answers",
        alias = "multiple",
        alias = "multi-answer",
        alias = "multiple_answers"
    )]
    MultipleAnswers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionAnswerStatus {
    #[serde(rename = "answered", alias = "Answered")]
    Answered,
    #[serde(
        rename = "not answered",
        alias = "not-answered",
        alias = "not_answered",
        alias = "unanswered",
        alias = "Not Answered"
    )]
    NotAnswered,
}

/// Resolved answering shape of a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice,
    MultiChoice,
    OpenEnded,
}

impl QuestionKind {
    pub fn resolve(questions_type: QuestionsType, close_ended: Option<CloseEndedType>) -> Self {
        match (questions_type, close_ended) {
            (QuestionsType::OpenEnded, _) => Self::OpenEnded,
            (QuestionsType::CloseEnded, Some(CloseEndedType::MultipleAnswers)) => Self::MultiChoice,
            (QuestionsType::CloseEnded, _) => Self::SingleChoice,
        }
    }

    /// Lenient parse of a per-question `type` field.
    pub fn from_wire(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "open-ended" | "open" | "text" | "essay" => Some(Self::OpenEnded),
            "multiple-choice-with-multiple-answers" | "multiple" | "multi-answer"
            | "multiple-answers" | "checkbox" => Some(Self::MultiChoice),
            "multiple-choice-with-single-answer" | "single" | "single-answer" | "radio"
            | "multiple-choice" | "mcq" => Some(Self::SingleChoice),
            _ => None,
        }
    }

    pub fn is_close_ended(self) -> bool {
        !matches!(self, Self::OpenEnded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    Text,
    Image,
}

impl AnswerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}
