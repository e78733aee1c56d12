mod auth;
pub mod client;
pub mod errors;
pub mod lecturer;
pub mod student;

pub use client::ApiClient;
pub use errors::ApiError;
pub use lecturer::{BulkUploadReport, Spreadsheet};
pub use student::AssessmentBackend;
