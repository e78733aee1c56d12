use reqwest::Method;
use validator::Validate;

use super::client::ApiClient;
use super::errors::ApiError;
use crate::models::UserProfile;
use crate::schemas::unwrap_object;
use crate::schemas::user::{ProfileUpdate, RawUser};

const ME_PATH: &str = "/auth/me";

impl ApiClient {
    pub async fn me(&self) -> Result<UserProfile, ApiError> {
        let value: serde_json::Value = self.get_json(ME_PATH).await?;
        profile_from_value(value)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        update.validate()?;
        let value: serde_json::Value = self.send_json(Method::PUT, ME_PATH, update).await?;
        profile_from_value(value)
    }
}

fn profile_from_value(value: serde_json::Value) -> Result<UserProfile, ApiError> {
    let raw: RawUser = serde_json::from_value(unwrap_object(value, &["user", "profile"]))
        .map_err(|err| ApiError::Decode { path: ME_PATH.to_string(), message: err.to_string() })?;
    Ok(UserProfile::try_from(raw)?)
}
