use serde::Serialize;

use crate::api::AssessmentBackend;
use crate::models::{Assessment, AssessmentKind, AssessmentStatus};

/// Tab filter on the assessment list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusFilter {
    #[default]
    All,
    Start,
    InProgress,
    Completed,
}

impl StatusFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "all" | "" => Some(Self::All),
            "start" => Some(Self::Start),
            "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn matches(self, status: AssessmentStatus) -> bool {
        match self {
            Self::All => true,
            Self::Start => status == AssessmentStatus::Start,
            Self::InProgress => status == AssessmentStatus::InProgress,
            Self::Completed => status == AssessmentStatus::Completed,
        }
    }
}

/// Fetches the student's assessments. A failed fetch yields an empty list.
pub async fn load_assessments(backend: &dyn AssessmentBackend) -> Vec<Assessment> {
    match backend.list_assessments().await {
        Ok(assessments) => {
            tracing::debug!(count = assessments.len(), "Loaded assessments");
            assessments
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to load assessments");
            Vec::new()
        }
    }
}

/// Subset with the given status, in the original order.
pub fn filter_by_status(assessments: &[Assessment], filter: StatusFilter) -> Vec<&Assessment> {
    assessments.iter().filter(|assessment| filter.matches(assessment.status)).collect()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AssessmentStats {
    pub total: usize,
    pub start: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub assignments: usize,
    pub cats: usize,
    /// Mean raw score over completed, scored assessments.
    pub average_score: Option<f64>,
    pub average_percentage: Option<f64>,
}

impl AssessmentStats {
    pub fn compute(assessments: &[Assessment]) -> Self {
        let mut stats = Self { total: assessments.len(), ..Self::default() };
        let mut scores = Vec::new();
        let mut percentages = Vec::new();

        for assessment in assessments {
            match assessment.status {
                AssessmentStatus::Start => stats.start += 1,
                AssessmentStatus::InProgress => stats.in_progress += 1,
                AssessmentStatus::Completed => stats.completed += 1,
            }
            match assessment.kind {
                AssessmentKind::Assignment => stats.assignments += 1,
                AssessmentKind::Cat => stats.cats += 1,
            }

            if assessment.status != AssessmentStatus::Completed {
                continue;
            }
            if let Some(score) = assessment.score {
                scores.push(score);
            }
            if let Some(percentage) = assessment.percentage() {
                percentages.push(percentage);
            }
        }

        stats.average_score = mean(&scores);
        stats.average_percentage = mean(&percentages);
        stats
    }

    pub fn count(&self, filter: StatusFilter) -> usize {
        match filter {
            StatusFilter::All => self.total,
            StatusFilter::Start => self.start,
            StatusFilter::InProgress => self.in_progress,
            StatusFilter::Completed => self.completed,
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
