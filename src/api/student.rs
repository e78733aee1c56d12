use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::client::{resource_path, ApiClient};
use super::errors::ApiError;
use crate::models::{AnswerPayload, Assessment};
use crate::schemas::assessment::assessments_from_value;

const ASSESSMENTS_PATH: &str = "/bd/student/assessments";
const QUESTIONS_PATH: &str = "/bd/student/questions";

/// Student-side assessment endpoints. The attempt machinery only talks to the
/// backend through this trait.
#[async_trait]
pub trait AssessmentBackend: Send + Sync {
    async fn list_assessments(&self) -> Result<Vec<Assessment>, ApiError>;

    async fn submit_answer(&self, question_id: &str, payload: &AnswerPayload) -> Result<(), ApiError>;

    async fn submit_assessment(&self, assessment_id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl AssessmentBackend for ApiClient {
    async fn list_assessments(&self) -> Result<Vec<Assessment>, ApiError> {
        let value: serde_json::Value = self.get_json(ASSESSMENTS_PATH).await?;
        Ok(assessments_from_value(value)?)
    }

    async fn submit_answer(&self, question_id: &str, payload: &AnswerPayload) -> Result<(), ApiError> {
        let path = format!("{}/answer", resource_path(QUESTIONS_PATH, question_id));
        let form = answer_form(payload)?;
        let _: serde_json::Value = self.send_multipart(&path, form).await?;
        Ok(())
    }

    async fn submit_assessment(&self, assessment_id: &str) -> Result<(), ApiError> {
        let path = format!("{}/submit", resource_path(ASSESSMENTS_PATH, assessment_id));
        let _: serde_json::Value = self.get_json(&path).await?;
        Ok(())
    }
}

fn answer_form(payload: &AnswerPayload) -> Result<Form, ApiError> {
    let form = Form::new().text("answer_type", payload.mode().as_str());
    match payload {
        AnswerPayload::Text(text) => Ok(form.text("text_answer", text.clone())),
        AnswerPayload::Image(image) => {
            let part = Part::bytes(image.bytes.clone())
                .file_name(image.filename.clone())
                .mime_str(&image.mime_type)
                .map_err(|err| ApiError::Validation(format!("invalid image mime type: {err}")))?;
            Ok(form.part("image", part))
        }
    }
}
