use std::sync::Arc;

use tokio::sync::RwLock;

use crate::api::{ApiClient, ApiError};
use crate::core::config::Settings;
use crate::core::time::{Clock, SystemClock};
use crate::models::UserProfile;
use crate::repositories::{AttemptRepository, FileAttemptRepository, MemoryAttemptRepository};
use crate::services::attempt::{AttemptController, AttemptOptions};

/// Application-level state handed to the UI layer. Cheap to clone.
#[derive(Clone)]
pub struct PortalContext {
    inner: Arc<InnerContext>,
}

struct InnerContext {
    settings: Settings,
    client: ApiClient,
    repository: Arc<dyn AttemptRepository>,
    clock: Arc<dyn Clock>,
    user: RwLock<Option<UserProfile>>,
}

impl PortalContext {
    pub fn new(settings: Settings) -> Result<Self, ApiError> {
        let client = ApiClient::from_settings(&settings)?;
        let repository: Arc<dyn AttemptRepository> = if settings.attempts().persist() {
            Arc::new(FileAttemptRepository::new(settings.attempts().directory()))
        } else {
            Arc::new(MemoryAttemptRepository::new())
        };

        Ok(Self::with_parts(settings, client, repository, Arc::new(SystemClock)))
    }

    pub fn with_parts(
        settings: Settings,
        client: ApiClient,
        repository: Arc<dyn AttemptRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(InnerContext {
                settings,
                client,
                repository,
                clock,
                user: RwLock::new(None),
            }),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn client(&self) -> &ApiClient {
        &self.inner.client
    }

    pub fn repository(&self) -> Arc<dyn AttemptRepository> {
        self.inner.repository.clone()
    }

    pub async fn current_user(&self) -> Option<UserProfile> {
        self.inner.user.read().await.clone()
    }

    pub async fn refresh_user(&self) -> Result<UserProfile, ApiError> {
        let profile = self.inner.client.me().await?;
        *self.inner.user.write().await = Some(profile.clone());
        tracing::debug!(user_id = %profile.id, "Current user refreshed");
        Ok(profile)
    }

    pub async fn clear_user(&self) {
        *self.inner.user.write().await = None;
    }

    /// Controller for the signed-in student, fetching the profile if needed.
    pub async fn attempt_controller(&self) -> Result<AttemptController, ApiError> {
        let student = match self.current_user().await {
            Some(user) => user,
            None => self.refresh_user().await?,
        };
        Ok(self.attempt_controller_for(&student.id))
    }

    pub fn attempt_controller_for(&self, student_id: &str) -> AttemptController {
        AttemptController::new(
            student_id,
            Arc::new(self.inner.client.clone()),
            self.inner.repository.clone(),
            self.inner.clock.clone(),
            AttemptOptions::from_settings(&self.inner.settings),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssessmentKind;
    use crate::services::attempt::{AttemptPhase, FinalizeOutcome, SyncStatus};
    use crate::services::load_assessments;
    use crate::test_support::FakePortal;

    #[tokio::test]
    async fn controller_is_bound_to_current_student() {
        let portal = FakePortal::start().await;
        let context = PortalContext::new(Settings::with_base_url(&portal.base_url()).expect("settings"))
            .expect("context");
        assert!(context.current_user().await.is_none());

        context.attempt_controller().await.expect("controller");
        let user = context.current_user().await.expect("user cached");
        assert_eq!(user.id, "42");

        context.clear_user().await;
        assert!(context.current_user().await.is_none());
    }

    #[tokio::test]
    async fn attempt_runs_end_to_end_over_http() {
        let portal = FakePortal::start().await;
        let context = PortalContext::new(Settings::with_base_url(&portal.base_url()).expect("settings"))
            .expect("context");
        let controller = context.attempt_controller().await.expect("controller");

        let assessments = load_assessments(context.client()).await;
        let cat = assessments
            .into_iter()
            .find(|assessment| assessment.kind == AssessmentKind::Cat)
            .expect("cat");

        let summary = controller.begin(cat).await.expect("begin");
        assert_eq!(summary.duration_minutes, Some(30));
        controller.agree().await.expect("agree");
        controller.toggle_choice(0).await.expect("toggle");
        controller.toggle_choice(1).await.expect("toggle");
        assert_eq!(controller.next().await, Ok(SyncStatus::Synced));
        controller.toggle_choice(1).await.expect("toggle");

        let outcome = controller.finish().await.expect("finish");
        assert!(matches!(outcome, FinalizeOutcome::Submitted(ref report) if report.fully_recorded()));
        assert_eq!(controller.phase().await, AttemptPhase::Completed);

        let answers = portal.recorded_answers().await;
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].text_answer.as_deref(), Some("Paging, Segmentation"));
        assert_eq!(answers[1].question_id, "12");
        assert_eq!(answers[1].text_answer.as_deref(), Some("Round robin"));
        assert_eq!(portal.submitted_assessments().await, vec!["1".to_string()]);
    }
}
