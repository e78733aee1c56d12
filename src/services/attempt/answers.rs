use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::errors::AttemptError;
use crate::models::{AnswerMode, AnswerPayload, ImageFile, Question, QuestionKind};

const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Local answer state for one question. The variant is fixed by the question
/// kind, so exactly one answer source is authoritative per question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerBuffer {
    Single {
        selected: Option<usize>,
    },
    Multi {
        selected: BTreeSet<usize>,
    },
    Open {
        mode: Option<AnswerMode>,
        text: String,
        image: Option<ImageFile>,
    },
}

impl AnswerBuffer {
    pub fn for_question(question: &Question) -> Self {
        match question.kind {
            QuestionKind::SingleChoice => Self::Single { selected: None },
            QuestionKind::MultiChoice => Self::Multi { selected: BTreeSet::new() },
            QuestionKind::OpenEnded => Self::Open { mode: None, text: String::new(), image: None },
        }
    }

    pub fn kind(&self) -> QuestionKind {
        match self {
            Self::Single { .. } => QuestionKind::SingleChoice,
            Self::Multi { .. } => QuestionKind::MultiChoice,
            Self::Open { .. } => QuestionKind::OpenEnded,
        }
    }

    /// Replaces any previous selection.
    pub fn select_choice(&mut self, index: usize, choice_count: usize) -> Result<(), AttemptError> {
        check_choice(index, choice_count)?;
        match self {
            Self::Single { selected } => {
                *selected = Some(index);
                Ok(())
            }
            _ => Err(AttemptError::WrongAnswerKind(kind_label(self.kind()))),
        }
    }

    pub fn toggle_choice(&mut self, index: usize, choice_count: usize) -> Result<(), AttemptError> {
        check_choice(index, choice_count)?;
        match self {
            Self::Multi { selected } => {
                if !selected.remove(&index) {
                    selected.insert(index);
                }
                Ok(())
            }
            _ => Err(AttemptError::WrongAnswerKind(kind_label(self.kind()))),
        }
    }

    /// One-shot: the first chosen mode is final for this question.
    pub fn choose_mode(&mut self, chosen: AnswerMode) -> Result<(), AttemptError> {
        match self {
            Self::Open { mode: Some(current), .. } if *current == chosen => Ok(()),
            Self::Open { mode: Some(current), .. } => Err(AttemptError::ModeLocked(current.as_str())),
            Self::Open { mode, .. } => {
                *mode = Some(chosen);
                Ok(())
            }
            _ => Err(AttemptError::WrongAnswerKind(kind_label(self.kind()))),
        }
    }

    pub fn set_text(&mut self, value: &str) -> Result<(), AttemptError> {
        match self {
            Self::Open { mode: Some(AnswerMode::Text), text, .. } => {
                *text = value.to_string();
                Ok(())
            }
            Self::Open { mode: Some(AnswerMode::Image), .. } => {
                Err(AttemptError::ModeLocked(AnswerMode::Image.as_str()))
            }
            Self::Open { mode: None, .. } => Err(AttemptError::ModeNotChosen),
            _ => Err(AttemptError::WrongAnswerKind(kind_label(self.kind()))),
        }
    }

    pub fn attach_image(&mut self, file: ImageFile, max_bytes: u64) -> Result<(), AttemptError> {
        match self {
            Self::Open { mode: Some(AnswerMode::Image), image, .. } => {
                validate_image(&file, max_bytes)?;
                *image = Some(file);
                Ok(())
            }
            Self::Open { mode: Some(AnswerMode::Text), .. } => {
                Err(AttemptError::ModeLocked(AnswerMode::Text.as_str()))
            }
            Self::Open { mode: None, .. } => Err(AttemptError::ModeNotChosen),
            _ => Err(AttemptError::WrongAnswerKind(kind_label(self.kind()))),
        }
    }

    pub fn is_answered(&self) -> bool {
        match self {
            Self::Single { selected } => selected.is_some(),
            Self::Multi { selected } => !selected.is_empty(),
            Self::Open { mode: Some(AnswerMode::Text), text, .. } => !text.trim().is_empty(),
            Self::Open { mode: Some(AnswerMode::Image), image, .. } => image.is_some(),
            Self::Open { mode: None, .. } => false,
        }
    }

    /// Transfer payload, or `None` while unanswered.
    pub fn payload(&self, question: &Question) -> Option<AnswerPayload> {
        if !self.is_answered() {
            return None;
        }

        match self {
            Self::Single { selected } => selected
                .and_then(|index| question.choices.get(index))
                .map(|choice| AnswerPayload::Text(choice.clone())),
            Self::Multi { selected } => {
                let texts: Vec<&str> = selected
                    .iter()
                    .filter_map(|index| question.choices.get(*index).map(String::as_str))
                    .collect();
                Some(AnswerPayload::Text(texts.join(", ")))
            }
            Self::Open { mode: Some(AnswerMode::Text), text, .. } => {
                Some(AnswerPayload::Text(text.clone()))
            }
            Self::Open { image: Some(image), .. } => Some(AnswerPayload::Image(image.clone())),
            Self::Open { .. } => None,
        }
    }
}

fn check_choice(index: usize, count: usize) -> Result<(), AttemptError> {
    if index < count {
        Ok(())
    } else {
        Err(AttemptError::ChoiceOutOfRange { index, count })
    }
}

fn kind_label(kind: QuestionKind) -> &'static str {
    match kind {
        QuestionKind::SingleChoice => "single-choice",
        QuestionKind::MultiChoice => "multi-choice",
        QuestionKind::OpenEnded => "open-ended",
    }
}

fn validate_image(file: &ImageFile, max_bytes: u64) -> Result<(), AttemptError> {
    if file.bytes.is_empty() {
        return Err(AttemptError::InvalidImage("file is empty".to_string()));
    }
    if file.bytes.len() as u64 > max_bytes {
        return Err(AttemptError::InvalidImage(format!("file exceeds {max_bytes} bytes")));
    }

    let extension = file
        .extension()
        .ok_or_else(|| AttemptError::InvalidImage("file must have an extension".to_string()))?;
    if !ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AttemptError::InvalidImage(format!("extension '{extension}' is not allowed")));
    }

    let mime = file.mime_type.trim().to_ascii_lowercase();
    let matches = match extension.as_str() {
        "jpg" | "jpeg" => matches!(mime.as_str(), "image/jpeg" | "image/jpg"),
        "png" => mime == "image/png",
        "webp" => mime == "image/webp",
        "gif" => mime == "image/gif",
        _ => false,
    };
    if matches {
        Ok(())
    } else {
        Err(AttemptError::InvalidImage(format!(
            "MIME type '{mime}' does not match extension '.{extension}'"
        )))
    }
}
