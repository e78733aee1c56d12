use serde::Serialize;
use time::OffsetDateTime;

use super::types::{
    AssessmentKind, AssessmentStatus, CloseEndedType, QuestionAnswerStatus, QuestionKind,
    QuestionsType,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub kind: QuestionKind,
    pub choices: Vec<String>,
    pub marks: f64,
    pub status: Option<QuestionAnswerStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub id: String,
    pub title: String,
    pub topic: Option<String>,
    pub kind: AssessmentKind,
    pub status: AssessmentStatus,
    pub questions_type: QuestionsType,
    pub close_ended_type: Option<CloseEndedType>,
    pub question_count: usize,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deadline: Option<OffsetDateTime>,
    pub duration_minutes: Option<u32>,
    pub total_marks: f64,
    pub questions: Vec<Question>,
    pub score: Option<f64>,
}

impl Assessment {
    /// Countdown length, `None` when the attempt is untimed.
    pub fn duration_seconds(&self) -> Option<u64> {
        self.duration_minutes.filter(|minutes| *minutes > 0).map(|minutes| u64::from(minutes) * 60)
    }

    pub fn percentage(&self) -> Option<f64> {
        let score = self.score?;
        if self.total_marks <= 0.0 {
            return None;
        }
        Some(score / self.total_marks * 100.0)
    }
}
