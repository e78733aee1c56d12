use serde::Deserialize;
use time::OffsetDateTime;

use super::flexible::{opt_datetime, opt_f64, opt_id, opt_u32};
use super::SchemaError;
use crate::models::{
    Assessment, AssessmentKind, AssessmentStatus, CloseEndedType, Question, QuestionAnswerStatus,
    QuestionKind, QuestionsType,
};

#[derive(Debug, Deserialize)]
pub struct RawQuestion {
    #[serde(default, alias = "_id", alias = "question_id", deserialize_with = "opt_id")]
    pub id: Option<String>,
    #[serde(default, alias = "question", alias = "question_text", alias = "questionText", alias = "prompt")]
    pub text: Option<String>,
    #[serde(default, rename = "type", alias = "question_type", alias = "questionType")]
    pub question_type: Option<String>,
    #[serde(default, alias = "options", alias = "answers")]
    pub choices: Option<Vec<String>>,
    #[serde(default, alias = "mark", alias = "points", deserialize_with = "opt_f64")]
    pub marks: Option<f64>,
    #[serde(default, alias = "answer_status", alias = "answerStatus")]
    pub status: Option<QuestionAnswerStatus>,
}

#[derive(Debug, Deserialize)]
pub struct RawAssessment {
    #[serde(default, alias = "_id", alias = "assessment_id", deserialize_with = "opt_id")]
    pub id: Option<String>,
    #[serde(default, alias = "name", alias = "assessment_title")]
    pub title: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default, rename = "type", alias = "assessment_type", alias = "assessmentType", alias = "kind")]
    pub kind: Option<AssessmentKind>,
    #[serde(default)]
    pub status: Option<AssessmentStatus>,
    #[serde(default, alias = "questionsType", alias = "question_type")]
    pub questions_type: Option<QuestionsType>,
    #[serde(default, alias = "closeEndedType")]
    pub close_ended_type: Option<CloseEndedType>,
    #[serde(
        default,
        alias = "question_count",
        alias = "questionCount",
        alias = "numberOfQuestions",
        deserialize_with = "opt_u32"
    )]
    pub number_of_questions: Option<u32>,
    #[serde(default, alias = "due_date", alias = "dueDate", deserialize_with = "opt_datetime")]
    pub deadline: Option<OffsetDateTime>,
    #[serde(
        default,
        alias = "duration_minutes",
        alias = "durationMinutes",
        deserialize_with = "opt_u32"
    )]
    pub duration: Option<u32>,
    #[serde(default, alias = "totalMarks", alias = "marks", deserialize_with = "opt_f64")]
    pub total_marks: Option<f64>,
    #[serde(default, alias = "question_list", alias = "questionList")]
    pub questions: Option<Vec<RawQuestion>>,
    #[serde(default, alias = "marks_obtained", alias = "obtained_marks", deserialize_with = "opt_f64")]
    pub score: Option<f64>,
}

impl RawQuestion {
    fn normalize(self, index: usize, fallback: QuestionKind) -> Result<Question, SchemaError> {
        let text = self
            .text
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(SchemaError::MissingField { entity: "question", field: "text" })?;
        let kind = self.question_type.as_deref().and_then(QuestionKind::from_wire).unwrap_or(fallback);
        let choices: Vec<String> = self
            .choices
            .unwrap_or_default()
            .into_iter()
            .map(|choice| choice.trim().to_string())
            .filter(|choice| !choice.is_empty())
            .collect();

        if kind.is_close_ended() && choices.is_empty() {
            return Err(SchemaError::MissingField { entity: "question", field: "choices" });
        }

        Ok(Question {
            id: self.id.unwrap_or_else(|| index.to_string()),
            text,
            kind,
            choices,
            marks: self.marks.unwrap_or(0.0),
            status: self.status,
        })
    }
}

impl TryFrom<RawAssessment> for Assessment {
    type Error = SchemaError;

    fn try_from(raw: RawAssessment) -> Result<Self, Self::Error> {
        let id = raw.id.ok_or(SchemaError::MissingField { entity: "assessment", field: "id" })?;
        let title = raw
            .title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .ok_or(SchemaError::MissingField { entity: "assessment", field: "title" })?;
        let questions_type = raw
            .questions_type
            .ok_or(SchemaError::MissingField { entity: "assessment", field: "questions_type" })?;

        let fallback = QuestionKind::resolve(questions_type, raw.close_ended_type);
        let questions = raw
            .questions
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, question)| question.normalize(index, fallback))
            .collect::<Result<Vec<_>, _>>()?;

        let question_count =
            raw.number_of_questions.map(|count| count as usize).unwrap_or(questions.len());
        let total_marks =
            raw.total_marks.unwrap_or_else(|| questions.iter().map(|question| question.marks).sum());

        Ok(Self {
            id,
            title,
            topic: raw.topic.map(|topic| topic.trim().to_string()).filter(|topic| !topic.is_empty()),
            kind: raw.kind.unwrap_or(AssessmentKind::Assignment),
            status: raw.status.unwrap_or(AssessmentStatus::Start),
            questions_type,
            close_ended_type: match questions_type {
                QuestionsType::CloseEnded => raw.close_ended_type,
                QuestionsType::OpenEnded => None,
            },
            question_count,
            deadline: raw.deadline,
            duration_minutes: raw.duration,
            total_marks,
            questions,
            score: raw.score,
        })
    }
}

pub(crate) fn assessments_from_value(value: serde_json::Value) -> Result<Vec<Assessment>, SchemaError> {
    let items = super::unwrap_list(value, &["assessments"], "assessment list")?;
    Ok(super::normalize_each::<RawAssessment, Assessment>(items, "assessment"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawAssessment {
        serde_json::from_value(value).expect("raw assessment")
    }

    #[test]
    fn normalizes_snake_case_payload() {
        let assessment = Assessment::try_from(raw(json!({
            "id": 7,
            "title": "Data Structures CAT 1",
            "topic": "Trees",
            "type": "CAT",
            "status": "in-progress",
            "questions_type": "close-ended",
            "close_ended_type": "multiple choice with multiple answers",
            "number_of_questions": 2,
            "deadline": "2025-03-01T08:00:00Z",
            "duration": 45,
            "questions": [
                { "id": 1, "question": "Pick balanced trees", "choices": ["AVL", "Red-black", "Heap"], "marks": 2 },
                { "id": 2, "question": "Pick heaps", "choices": ["Binary", "Fibonacci"], "marks": "3" }
            ]
        })))
        .expect("assessment");

        assert_eq!(assessment.id, "7");
        assert_eq!(assessment.kind, AssessmentKind::Cat);
        assert_eq!(assessment.status, AssessmentStatus::InProgress);
        assert_eq!(assessment.close_ended_type, Some(CloseEndedType::MultipleAnswers));
        assert_eq!(assessment.question_count, 2);
        assert_eq!(assessment.duration_seconds(), Some(45 * 60));
        assert_eq!(assessment.total_marks, 5.0);
        assert!(assessment.questions.iter().all(|question| question.kind == QuestionKind::MultiChoice));
        assert!(assessment.deadline.is_some());
    }

    #[test]
    fn normalizes_camel_case_payload() {
        let assessment = Assessment::try_from(raw(json!({
            "_id": "a-1",
            "name": "Essay",
            "questionsType": "open-ended",
            "closeEndedType": "single",
            "totalMarks": 20,
            "durationMinutes": "0",
            "questionList": [{ "_id": "q-1", "questionText": "Discuss", "questionType": "open-ended" }]
        })))
        .expect("assessment");

        assert_eq!(assessment.id, "a-1");
        assert_eq!(assessment.title, "Essay");
        assert_eq!(assessment.status, AssessmentStatus::Start);
        assert_eq!(assessment.close_ended_type, None);
        assert_eq!(assessment.question_count, 1);
        assert_eq!(assessment.duration_seconds(), None);
        assert_eq!(assessment.total_marks, 20.0);
        assert_eq!(assessment.questions[0].kind, QuestionKind::OpenEnded);
    }

    #[test]
    fn per_question_type_overrides_assessment_default() {
        let assessment = Assessment::try_from(raw(json!({
            "id": 1,
            "title": "Mixed",
            "questions_type": "close-ended",
            "questions": [
                { "id": 1, "question": "Explain", "type": "open-ended" },
                { "id": 2, "question": "Pick", "choices": ["a", "b"] }
            ]
        })))
        .expect("assessment");

        assert_eq!(assessment.questions[0].kind, QuestionKind::OpenEnded);
        assert_eq!(assessment.questions[1].kind, QuestionKind::SingleChoice);
    }

    #[test]
    fn close_ended_question_without_choices_is_rejected() {
        let err = Assessment::try_from(raw(json!({
            "id": 1,
            "title": "Broken",
            "questions_type": "close-ended",
            "questions": [{ "id": 1, "question": "Pick", "choices": [] }]
        })))
        .unwrap_err();
        assert_eq!(err, SchemaError::MissingField { entity: "question", field: "choices" });
    }

    #[test]
    fn list_skips_invalid_records_and_keeps_order() {
        let list = assessments_from_value(json!({
            "assessments": [
                { "id": 1, "title": "First", "questions_type": "open-ended" },
                { "title": "No id", "questions_type": "open-ended" },
                { "id": 3, "title": "Third", "questions_type": "open-ended", "status": "completed" }
            ]
        }))
        .expect("list");

        let ids: Vec<&str> = list.iter().map(|assessment| assessment.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }
}
