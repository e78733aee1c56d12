use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::errors::{extract_error_message, ApiError};
use crate::core::config::{BaseUrl, Settings};

/// Credentialed HTTP client for the portal backend. Session cookies set by
/// the backend are kept in the client's cookie store and replayed on every
/// call; the client never handles tokens itself.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: BaseUrl,
}

impl ApiClient {
    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(settings.api().connect_timeout_seconds))
            .timeout(Duration::from_secs(settings.api().timeout_seconds))
            .build()
            .map_err(|err| ApiError::Client(err.to_string()))?;

        Ok(Self { client, base_url: settings.api().base_url.clone() })
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.request(Method::GET, path);
        self.execute(path, request).await
    }

    pub(crate) async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(method, path).json(body);
        self.execute(path, request).await
    }

    pub(crate) async fn send_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, ApiError> {
        let request = self.request(Method::POST, path).multipart(form);
        self.execute(path, request).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, path);
        let _: serde_json::Value = self.execute(path, request).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.base_url.join(path))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|err| ApiError::from_transport(path, err))?;
        decode_response(path, response).await
    }
}

async fn decode_response<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let raw_body = response.text().await.map_err(|err| ApiError::from_transport(path, err))?;

    if !status.is_success() {
        let detail = extract_error_message(&raw_body);
        tracing::debug!(path, status = status.as_u16(), detail = %detail, "Portal request rejected");
        return Err(ApiError::Status { path: path.to_string(), status: status.as_u16(), detail });
    }

    // Several endpoints answer 200/204 with an empty body.
    let body = if raw_body.trim().is_empty() { "null" } else { raw_body.as_str() };
    serde_json::from_str(body)
        .map_err(|err| ApiError::Decode { path: path.to_string(), message: err.to_string() })
}

/// `{collection}/{id}` with the id encoded as a single path segment, so ids
/// carrying `/`, `?` or `#` cannot reach a different endpoint.
pub(crate) fn resource_path(collection: &str, id: &str) -> String {
    format!("{collection}/{}", urlencoding::encode(id))
}
