use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use validator::Validate;

use super::client::{resource_path, ApiClient};
use super::errors::ApiError;
use crate::models::{Course, Student, Unit};
use crate::schemas::course::{CourseForm, RawCourse, RawStudent, RawUnit, StudentForm, UnitForm};
use crate::schemas::{normalize_each, unwrap_list, unwrap_object, SchemaError};

const COURSES_PATH: &str = "/lecturer/courses";
const UNITS_PATH: &str = "/lecturer/units";
const STUDENTS_PATH: &str = "/lecturer/students";
const STUDENTS_UPLOAD_PATH: &str = "/lecturer/students/upload";

/// Outcome of a spreadsheet bulk upload as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BulkUploadReport {
    pub created: u64,
    pub failed: u64,
    pub errors: Vec<String>,
}

/// A spreadsheet selected for bulk upload.
#[derive(Debug, Clone)]
pub struct Spreadsheet {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Spreadsheet {
    fn mime_type(&self) -> &'static str {
        let lower = self.filename.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            "text/csv"
        } else if lower.ends_with(".xls") {
            "application/vnd.ms-excel"
        } else {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        }
    }
}

impl ApiClient {
    pub async fn list_courses(&self) -> Result<Vec<Course>, ApiError> {
        self.list::<RawCourse, Course>(COURSES_PATH, "courses").await
    }

    pub async fn create_course(&self, form: &CourseForm) -> Result<Course, ApiError> {
        self.write::<_, RawCourse, Course>(Method::POST, COURSES_PATH, form, "course").await
    }

    pub async fn update_course(&self, id: &str, form: &CourseForm) -> Result<Course, ApiError> {
        let path = resource_path(COURSES_PATH, id);
        self.write::<_, RawCourse, Course>(Method::PUT, &path, form, "course").await
    }

    pub async fn delete_course(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&resource_path(COURSES_PATH, id)).await
    }

    pub async fn list_units(&self) -> Result<Vec<Unit>, ApiError> {
        self.list::<RawUnit, Unit>(UNITS_PATH, "units").await
    }

    pub async fn create_unit(&self, form: &UnitForm) -> Result<Unit, ApiError> {
        self.write::<_, RawUnit, Unit>(Method::POST, UNITS_PATH, form, "unit").await
    }

    pub async fn update_unit(&self, id: &str, form: &UnitForm) -> Result<Unit, ApiError> {
        let path = resource_path(UNITS_PATH, id);
        self.write::<_, RawUnit, Unit>(Method::PUT, &path, form, "unit").await
    }

    pub async fn delete_unit(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&resource_path(UNITS_PATH, id)).await
    }

    pub async fn list_students(&self) -> Result<Vec<Student>, ApiError> {
        self.list::<RawStudent, Student>(STUDENTS_PATH, "students").await
    }

    pub async fn create_student(&self, form: &StudentForm) -> Result<Student, ApiError> {
        self.write::<_, RawStudent, Student>(Method::POST, STUDENTS_PATH, form, "student").await
    }

    pub async fn update_student(&self, id: &str, form: &StudentForm) -> Result<Student, ApiError> {
        let path = resource_path(STUDENTS_PATH, id);
        self.write::<_, RawStudent, Student>(Method::PUT, &path, form, "student").await
    }

    pub async fn delete_student(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&resource_path(STUDENTS_PATH, id)).await
    }

    pub async fn bulk_upload_students(&self, file: &Spreadsheet) -> Result<BulkUploadReport, ApiError> {
        if file.bytes.is_empty() {
            return Err(ApiError::Validation("spreadsheet is empty".to_string()));
        }

        let part = Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str(file.mime_type())
            .map_err(|err| ApiError::Client(err.to_string()))?;
        let form = Form::new().part("file", part);

        let value: serde_json::Value = self.send_multipart(STUDENTS_UPLOAD_PATH, form).await?;
        Ok(upload_report(&value))
    }

    async fn list<Raw, T>(&self, path: &str, key: &str) -> Result<Vec<T>, ApiError>
    where
        Raw: DeserializeOwned,
        T: TryFrom<Raw, Error = SchemaError>,
    {
        let value: serde_json::Value = self.get_json(path).await?;
        let items = unwrap_list(value, &[key], "lecturer list")?;
        Ok(normalize_each::<Raw, T>(items, "lecturer record"))
    }

    async fn write<F, Raw, T>(
        &self,
        method: Method,
        path: &str,
        form: &F,
        key: &str,
    ) -> Result<T, ApiError>
    where
        F: Serialize + Validate,
        Raw: DeserializeOwned,
        T: TryFrom<Raw, Error = SchemaError>,
    {
        form.validate()?;
        let value: serde_json::Value = self.send_json(method, path, form).await?;
        let raw: Raw = serde_json::from_value(unwrap_object(value, &[key]))
            .map_err(|err| ApiError::Decode { path: path.to_string(), message: err.to_string() })?;
        Ok(T::try_from(raw)?)
    }
}

fn upload_report(value: &serde_json::Value) -> BulkUploadReport {
    let count = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| value.get(*key).and_then(serde_json::Value::as_u64))
            .unwrap_or(0)
    };
    let errors = value
        .get("errors")
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
                .collect()
        })
        .unwrap_or_default();

    BulkUploadReport {
        created: count(&["created", "created_count", "inserted"]),
        failed: count(&["failed", "failed_count", "skipped"]),
        errors,
    }
}
