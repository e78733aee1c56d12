pub mod answer;
pub mod assessment;
pub mod course;
pub mod types;
pub mod user;

pub use answer::{AnswerPayload, ImageFile};
pub use assessment::{Assessment, Question};
pub use course::{Course, Student, Unit};
pub use types::{
    AnswerMode, AssessmentKind, AssessmentStatus, CloseEndedType, QuestionAnswerStatus,
    QuestionKind, QuestionsType,
};
pub use user::UserProfile;
