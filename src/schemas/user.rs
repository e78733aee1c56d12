use serde::{Deserialize, Serialize};
use validator::Validate;

use super::flexible::opt_id;
use super::SchemaError;
use crate::models::UserProfile;

#[derive(Debug, Deserialize)]
pub struct RawUser {
    #[serde(default, alias = "_id", alias = "user_id", deserialize_with = "opt_id")]
    pub id: Option<String>,
    #[serde(default, alias = "firstname", alias = "firstName", alias = "fname")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastname", alias = "lastName", alias = "lname", alias = "surname")]
    pub last_name: Option<String>,
    /// Some endpoints only send a combined display name.
    #[serde(default, alias = "full_name", alias = "fullName")]
    pub name: Option<String>,
    #[serde(default, alias = "email_address", alias = "emailAddress")]
    pub email: Option<String>,
    #[serde(default, alias = "user_type", alias = "userType")]
    pub role: Option<String>,
    #[serde(default, alias = "phone_number", alias = "phoneNumber")]
    pub phone: Option<String>,
}

impl TryFrom<RawUser> for UserProfile {
    type Error = SchemaError;

    fn try_from(raw: RawUser) -> Result<Self, Self::Error> {
        let id = raw.id.ok_or(SchemaError::MissingField { entity: "user", field: "id" })?;
        let email = non_empty(raw.email)
            .ok_or(SchemaError::MissingField { entity: "user", field: "email" })?;

        let (first_name, last_name) = match (non_empty(raw.first_name), non_empty(raw.last_name)) {
            (Some(first), last) => (first, last.unwrap_or_default()),
            (None, last) => {
                let full = non_empty(raw.name)
                    .ok_or(SchemaError::MissingField { entity: "user", field: "first_name" })?;
                match full.split_once(' ') {
                    Some((first, rest)) if last.is_none() => {
                        (first.to_string(), rest.trim().to_string())
                    }
                    _ => (full, last.unwrap_or_default()),
                }
            }
        };

        Ok(Self {
            id,
            first_name,
            last_name,
            email,
            role: non_empty(raw.role).map(|role| role.to_ascii_lowercase()),
            phone: non_empty(raw.phone),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "first_name must not be empty"))]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "last_name must not be empty"))]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl From<&UserProfile> for ProfileUpdate {
    fn from(profile: &UserProfile) -> Self {
        Self {
            first_name: Some(profile.first_name.clone()),
            last_name: Some(profile.last_name.clone()),
            email: Some(profile.email.clone()),
            phone: profile.phone.clone(),
        }
    }
}

pub(super) fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|item| item.trim().to_string()).filter(|item| !item.is_empty())
}
