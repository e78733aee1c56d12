use serde::{Deserialize, Serialize};
use validator::Validate;

use super::flexible::{opt_id, opt_u32};
use super::user::non_empty;
use super::SchemaError;
use crate::models::{Course, Student, Unit};

#[derive(Debug, Deserialize)]
pub struct RawCourse {
    #[serde(default, alias = "_id", alias = "course_id", deserialize_with = "opt_id")]
    pub id: Option<String>,
    #[serde(default, alias = "course_name", alias = "courseName", alias = "title")]
    pub name: Option<String>,
    #[serde(default, alias = "course_code", alias = "courseCode")]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawUnit {
    #[serde(default, alias = "_id", alias = "unit_id", deserialize_with = "opt_id")]
    pub id: Option<String>,
    #[serde(default, alias = "unit_code", alias = "unitCode")]
    pub code: Option<String>,
    #[serde(default, alias = "unit_name", alias = "unitName", alias = "title")]
    pub name: Option<String>,
    #[serde(default, alias = "year", deserialize_with = "opt_u32")]
    pub level: Option<u32>,
    #[serde(default, alias = "sem", deserialize_with = "opt_u32")]
    pub semester: Option<u32>,
    #[serde(default, alias = "courseId", alias = "course", deserialize_with = "opt_id")]
    pub course_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawStudent {
    #[serde(default, alias = "_id", alias = "student_id", deserialize_with = "opt_id")]
    pub id: Option<String>,
    #[serde(default, alias = "firstname", alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastname", alias = "lastName", alias = "surname")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(
        default,
        alias = "registration_number",
        alias = "regNumber",
        alias = "reg_no",
        alias = "admission_number"
    )]
    pub reg_number: Option<String>,
    #[serde(default, alias = "courseId", alias = "course", deserialize_with = "opt_id")]
    pub course_id: Option<String>,
}

impl TryFrom<RawCourse> for Course {
    type Error = SchemaError;

    fn try_from(raw: RawCourse) -> Result<Self, Self::Error> {
        Ok(Self {
            id: raw.id.ok_or(SchemaError::MissingField { entity: "course", field: "id" })?,
            name: non_empty(raw.name)
                .ok_or(SchemaError::MissingField { entity: "course", field: "name" })?,
            code: non_empty(raw.code).unwrap_or_default(),
            description: non_empty(raw.description),
        })
    }
}

impl TryFrom<RawUnit> for Unit {
    type Error = SchemaError;

    fn try_from(raw: RawUnit) -> Result<Self, Self::Error> {
        Ok(Self {
            id: raw.id.ok_or(SchemaError::MissingField { entity: "unit", field: "id" })?,
            code: non_empty(raw.code)
                .ok_or(SchemaError::MissingField { entity: "unit", field: "code" })?,
            name: non_empty(raw.name)
                .ok_or(SchemaError::MissingField { entity: "unit", field: "name" })?,
            level: small_number("level", raw.level)?,
            semester: small_number("semester", raw.semester)?,
            course_id: raw.course_id,
        })
    }
}

impl TryFrom<RawStudent> for Student {
    type Error = SchemaError;

    fn try_from(raw: RawStudent) -> Result<Self, Self::Error> {
        Ok(Self {
            id: raw.id.ok_or(SchemaError::MissingField { entity: "student", field: "id" })?,
            first_name: non_empty(raw.first_name)
                .ok_or(SchemaError::MissingField { entity: "student", field: "first_name" })?,
            last_name: non_empty(raw.last_name).unwrap_or_default(),
            email: non_empty(raw.email).unwrap_or_default(),
            reg_number: non_empty(raw.reg_number),
            course_id: raw.course_id,
        })
    }
}

fn small_number(field: &'static str, value: Option<u32>) -> Result<u8, SchemaError> {
    let value = value.unwrap_or(1);
    u8::try_from(value).map_err(|_| SchemaError::InvalidField {
        entity: "unit",
        field,
        value: value.to_string(),
    })
}

#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct CourseForm {
    #[validate(length(min = 1, message = "course name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "course code is required"))]
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct UnitForm {
    #[validate(length(min = 1, message = "unit code is required"))]
    pub code: String,
    #[validate(length(min = 1, message = "unit name is required"))]
    pub name: String,
    #[validate(range(min = 1, max = 6, message = "level must be between 1 and 6"))]
    pub level: u8,
    #[validate(range(min = 1, max = 3, message = "semester must be between 1 and 3"))]
    pub semester: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct StudentForm {
    #[validate(length(min = 1, message = "first name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "last name is required"))]
    pub last_name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reg_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
}

impl From<&Course> for CourseForm {
    fn from(course: &Course) -> Self {
        Self {
            name: course.name.clone(),
            code: course.code.clone(),
            description: course.description.clone(),
        }
    }
}

impl From<&Unit> for UnitForm {
    fn from(unit: &Unit) -> Self {
        Self {
            code: unit.code.clone(),
            name: unit.name.clone(),
            level: unit.level,
            semester: unit.semester,
            course_id: unit.course_id.clone(),
        }
    }
}

impl From<&Student> for StudentForm {
    fn from(student: &Student) -> Self {
        Self {
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
            email: student.email.clone(),
            reg_number: student.reg_number.clone(),
            course_id: student.course_id.clone(),
        }
    }
}
