use serde::Serialize;
use thiserror::Error;

use crate::models::Student;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush csv buffer: {0}")]
    Buffer(String),
}

const HEADER: [&str; 6] = ["id", "first_name", "last_name", "email", "reg_number", "course_id"];

#[derive(Serialize)]
struct StudentRow<'a> {
    id: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    reg_number: &'a str,
    course_id: &'a str,
}

/// Student roster as CSV with a header row, ready to hand to a download.
pub fn students_csv(students: &[Student]) -> Result<Vec<u8>, ExportError> {
    // Header written by hand so an empty roster still yields a valid file.
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for student in students {
        writer.serialize(StudentRow {
            id: &student.id,
            first_name: &student.first_name,
            last_name: &student.last_name,
            email: &student.email,
            reg_number: student.reg_number.as_deref().unwrap_or_default(),
            course_id: student.course_id.as_deref().unwrap_or_default(),
        })?;
    }

    writer.into_inner().map_err(|err| ExportError::Buffer(err.to_string()))
}

pub fn students_csv_filename(course_code: Option<&str>) -> String {
    match course_code.map(str::trim).filter(|code| !code.is_empty()) {
        Some(code) => format!("students-{}.csv", code.to_ascii_lowercase().replace(' ', "-")),
        None => "students.csv".to_string(),
    }
}
