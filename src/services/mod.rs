pub mod assessment_list;
pub mod attempt;
pub mod csv_export;
pub mod editable;

pub use assessment_list::{filter_by_status, load_assessments, AssessmentStats, StatusFilter};
pub use editable::{EditableRecord, SaveStatus};
